//! Authenticated session lifecycle.
//!
//! # Responsibility
//! - Define the identity provider seam (sign-in, sign-out, live identity).
//! - Carry the per-sign-in `SessionContext` handed to queue, flusher and
//!   listener constructors.
//!
//! # Invariants
//! - A context is created on sign-in and dropped on sign-out; nothing keyed
//!   by identity outlives it except the persisted queue blob.
//! - Async work compares `SessionContext::generation` after every suspension
//!   point and drops results that belong to an ended session.

mod context;
mod identity;

pub use context::SessionContext;
pub use identity::{sign_in, AuthError, Identity, IdentityProvider, SignInOutcome};
