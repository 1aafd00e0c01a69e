//! Error taxonomy shared by all modules.
//!
//! # Responsibility
//! - Classify failures by how the client must react to them.
//! - Define validation errors raised before any state mutation.
//!
//! # Invariants
//! - `RecoverableUser` errors never leave partial state behind.
//! - Sync failures are never surfaced as errors to callers; see
//!   `sync::flusher` for the quiet warning path.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// How a failure is surfaced and recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient and non-blocking: retried automatically or abandoned.
    RecoverableLocal,
    /// Input rejected; the user must correct it.
    RecoverableUser,
    /// Required configuration missing; the interactive surface is disabled.
    ConfigurationFatal,
}

/// User input rejected before any queue or display change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    NotSignedIn,
    EmptyBody,
    EmptyLabelName,
    DuplicateLabel(String),
    /// Label exists only locally; deleting it before the store confirms it
    /// is refused.
    LabelPendingSync(String),
    NoteNotFound(String),
    LabelNotFound(String),
}

impl InputError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::RecoverableUser
    }
}

impl Display for InputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSignedIn => write!(f, "Sign in to edit notes."),
            Self::EmptyBody => write!(f, "Body is required."),
            Self::EmptyLabelName => write!(f, "Label name is required."),
            Self::DuplicateLabel(_) => write!(f, "Label already exists."),
            Self::LabelPendingSync(_) => {
                write!(f, "Label is still syncing. Try again in a moment.")
            }
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::LabelNotFound(id) => write!(f, "label not found: {id}"),
        }
    }
}

impl Error for InputError {}

#[cfg(test)]
mod tests {
    use super::{ErrorClass, InputError};

    #[test]
    fn input_errors_are_user_recoverable_with_stable_messages() {
        assert_eq!(InputError::EmptyBody.class(), ErrorClass::RecoverableUser);
        assert_eq!(InputError::EmptyBody.to_string(), "Body is required.");
        assert_eq!(
            InputError::DuplicateLabel("Work".to_string()).to_string(),
            "Label already exists."
        );
    }
}
