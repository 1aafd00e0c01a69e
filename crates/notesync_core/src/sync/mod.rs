//! Offline-first sync engine.
//!
//! # Responsibility
//! - Queue local mutations and project them over remote snapshots.
//! - Deliver queued mutations to the remote store with backoff.
//!
//! # See also
//! - `service::NotesClient` for the controller that wires these together.

pub mod backoff;
pub mod driver;
pub mod flusher;
pub mod listener;
pub mod memory;
pub mod projector;
pub mod queue;
pub mod remote;

pub use backoff::Backoff;
pub use driver::run_sync;
pub use flusher::{FlushOutcome, FlushSkip, FlushTarget, Flusher, SYNC_WARNING};
pub use listener::SnapshotListener;
pub use memory::{InMemoryRemoteStore, WriteKind, WriteRecord};
pub use projector::{apply_acknowledged, project, project_labels, project_notes, DisplayState};
pub use queue::{queue_key, MutationQueue};
pub use remote::{
    LabelDocument, NoteDocument, NotesPage, PageCursor, RemoteError, RemoteLabel, RemoteNote,
    RemoteResult, RemoteStore, Subscription,
};
