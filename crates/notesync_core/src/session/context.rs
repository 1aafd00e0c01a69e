use crate::session::Identity;

/// State scoped to one signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    identity: Identity,
    generation: u64,
}

impl SessionContext {
    pub fn new(identity: Identity, generation: u64) -> Self {
        Self {
            identity,
            generation,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn uid(&self) -> &str {
        &self.identity.uid
    }

    /// Distinguishes two sign-ins of the same identity.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
