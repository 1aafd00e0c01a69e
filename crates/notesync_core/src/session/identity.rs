//! Identity provider seam.

use crate::error::ErrorClass;
use futures_util::future::LocalBoxFuture;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::watch;

/// Opaque authenticated-user handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The interactive flow could not open (e.g. popup blocked).
    InteractiveBlocked,
    Cancelled,
    Failed(String),
}

impl AuthError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::RecoverableLocal
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InteractiveBlocked => write!(f, "interactive sign-in was blocked"),
            Self::Cancelled => write!(f, "sign-in cancelled"),
            Self::Failed(message) => write!(f, "{message}"),
        }
    }
}

impl Error for AuthError {}

/// External sign-in service.
pub trait IdentityProvider {
    fn sign_in_interactive(&self) -> LocalBoxFuture<'_, Result<Identity, AuthError>>;
    /// Starts the redirect flow; completion arrives on the next launch.
    fn sign_in_redirect(&self) -> LocalBoxFuture<'_, Result<(), AuthError>>;
    /// Resolves a pending redirect sign-in, if any.
    fn complete_redirect(&self) -> LocalBoxFuture<'_, Result<Option<Identity>, AuthError>>;
    fn sign_out(&self) -> LocalBoxFuture<'_, Result<(), AuthError>>;
    /// Live current identity; `None` while signed out.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    SignedIn(Identity),
    /// The app will be reloaded by the redirect flow.
    Redirecting,
}

/// Signs in interactively, falling back to the redirect flow when the
/// interactive flow is blocked.
pub async fn sign_in(provider: &dyn IdentityProvider) -> Result<SignInOutcome, AuthError> {
    match provider.sign_in_interactive().await {
        Ok(identity) => {
            info!("event=sign_in module=session status=ok flow=interactive");
            Ok(SignInOutcome::SignedIn(identity))
        }
        Err(AuthError::InteractiveBlocked) => {
            warn!("event=sign_in module=session status=fallback flow=redirect");
            provider.sign_in_redirect().await?;
            Ok(SignInOutcome::Redirecting)
        }
        Err(err) => {
            warn!("event=sign_in module=session status=error flow=interactive error={err}");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{sign_in, AuthError, Identity, IdentityProvider, SignInOutcome};
    use futures_util::future::{FutureExt, LocalBoxFuture};
    use std::cell::Cell;
    use tokio::sync::watch;

    struct FakeProvider {
        interactive: Result<Identity, AuthError>,
        redirects: Cell<usize>,
        identity: watch::Sender<Option<Identity>>,
    }

    impl FakeProvider {
        fn new(interactive: Result<Identity, AuthError>) -> Self {
            Self {
                interactive,
                redirects: Cell::new(0),
                identity: watch::channel(None).0,
            }
        }
    }

    impl IdentityProvider for FakeProvider {
        fn sign_in_interactive(&self) -> LocalBoxFuture<'_, Result<Identity, AuthError>> {
            let result = self.interactive.clone();
            async move { result }.boxed_local()
        }

        fn sign_in_redirect(&self) -> LocalBoxFuture<'_, Result<(), AuthError>> {
            self.redirects.set(self.redirects.get() + 1);
            async { Ok(()) }.boxed_local()
        }

        fn complete_redirect(&self) -> LocalBoxFuture<'_, Result<Option<Identity>, AuthError>> {
            async { Ok(None) }.boxed_local()
        }

        fn sign_out(&self) -> LocalBoxFuture<'_, Result<(), AuthError>> {
            async { Ok(()) }.boxed_local()
        }

        fn watch(&self) -> watch::Receiver<Option<Identity>> {
            self.identity.subscribe()
        }
    }

    #[tokio::test]
    async fn interactive_success_skips_redirect() {
        let provider = FakeProvider::new(Ok(Identity::new("u1")));
        let outcome = sign_in(&provider).await.unwrap();
        assert_eq!(outcome, SignInOutcome::SignedIn(Identity::new("u1")));
        assert_eq!(provider.redirects.get(), 0);
    }

    #[tokio::test]
    async fn blocked_interactive_falls_back_to_redirect() {
        let provider = FakeProvider::new(Err(AuthError::InteractiveBlocked));
        let outcome = sign_in(&provider).await.unwrap();
        assert_eq!(outcome, SignInOutcome::Redirecting);
        assert_eq!(provider.redirects.get(), 1);
    }

    #[tokio::test]
    async fn other_failures_are_returned() {
        let provider = FakeProvider::new(Err(AuthError::Cancelled));
        let err = sign_in(&provider).await.unwrap_err();
        assert_eq!(err, AuthError::Cancelled);
        assert_eq!(provider.redirects.get(), 0);
    }
}
