//! Domain model for synced notes and labels.
//!
//! # Responsibility
//! - Define the note/label records shared by the queue, projector and UI.
//! - Define the closed set of intended changes (`Mutation`).
//!
//! # Invariants
//! - `Note::label_ids` and `Note::label_names` always have equal length and
//!   positions correspond.
//! - Mutation ids are generated locally and never equal a target entity id.
//!
//! # See also
//! - `sync::queue` for how mutations coalesce.

pub mod ids;
pub mod label;
pub mod mutation;
pub mod note;
