//! Use-case layer.
//!
//! # Responsibility
//! - Turn user actions into queued mutations through `NotesClient`.
//! - Keep presentation layers decoupled from sync mechanics.

pub mod client;
pub mod editor;

pub use client::{NotesClient, Observer, ObserverId, REDIRECT_FAILED_MESSAGE};
pub use editor::NoteEditor;
