//! Offline-first note sync engine.
//! This crate is the single source of truth for sync invariants.

pub mod clipboard;
pub mod clock;
pub mod config;
pub mod db;
pub mod draft;
pub mod error;
pub mod logging;
pub mod model;
pub mod notice;
pub mod search;
pub mod service;
pub mod session;
pub mod storage;
pub mod sync;

pub use clipboard::{Clipboard, ClipboardError};
pub use clock::{Clock, ManualClock, Stamper, SystemClock};
pub use config::{ConfigError, RemoteStoreConfig, SyncSettings, CONFIG_MISSING_MESSAGE};
pub use draft::{DraftHistory, DraftSnapshot};
pub use error::{ErrorClass, InputError};
pub use logging::{
    default_log_level, init_logging, init_logging_from_env, logging_status, LogConfig, LogLevel,
};
pub use model::label::Label;
pub use model::mutation::{Mutation, MutationOp};
pub use model::note::Note;
pub use notice::{Notice, NoticeBoard, NoticeId, NoticeKind};
pub use search::{LabelFilter, NoteFilter};
pub use service::{NoteEditor, NotesClient};
pub use session::{Identity, IdentityProvider, SessionContext};
pub use storage::{KvStore, MemoryKvStore, SqliteKvStore, StorageError};
pub use sync::{
    run_sync, DisplayState, FlushOutcome, FlushSkip, InMemoryRemoteStore, MutationQueue,
    RemoteError, RemoteStore,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
