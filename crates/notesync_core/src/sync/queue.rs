//! Local mutation queue.
//!
//! # Responsibility
//! - Hold pending mutations in delivery (FIFO) order.
//! - Coalesce writes per entity on insertion.
//! - Persist the queue per identity after every change.
//!
//! # Invariants
//! - At most one pending upsert per entity; a delete removes every earlier
//!   pending write of its entity.
//! - Length never exceeds `max_len`. Overflow drops the OLDEST entries
//!   without notice: those edits are lost if they were never delivered. The
//!   drop is only logged.
//! - Persistence is best-effort. Unreadable persisted state loads as empty.

use crate::model::mutation::Mutation;
use crate::session::SessionContext;
use crate::storage::KvStore;
use log::{debug, warn};
use std::rc::Rc;

pub const QUEUE_KEY_PREFIX: &str = "note-sync-queue-v1:";

/// Storage key holding the queue of `uid`.
pub fn queue_key(uid: &str) -> String {
    format!("{QUEUE_KEY_PREFIX}{uid}")
}

struct QueuePersistence {
    store: Rc<dyn KvStore>,
    key: String,
}

/// Ordered, coalescing list of pending mutations.
pub struct MutationQueue {
    entries: Vec<Mutation>,
    max_len: usize,
    persistence: Option<QueuePersistence>,
}

impl MutationQueue {
    /// Queue with no identity behind it; never persisted.
    pub fn detached(max_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_len,
            persistence: None,
        }
    }

    /// Loads the persisted queue of the session identity.
    ///
    /// Missing, unreadable or corrupt data yields an empty queue.
    pub fn load(ctx: &SessionContext, store: Rc<dyn KvStore>, max_len: usize) -> Self {
        let key = queue_key(ctx.uid());
        let mut entries = match store.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Mutation>>(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("event=queue_load module=sync status=corrupt error={err}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!("event=queue_load module=sync status=error error={err}");
                Vec::new()
            }
        };
        if entries.len() > max_len {
            entries.drain(..entries.len() - max_len);
        }
        debug!(
            "event=queue_load module=sync status=ok pending={}",
            entries.len()
        );
        Self {
            entries,
            max_len,
            persistence: Some(QueuePersistence { store, key }),
        }
    }

    /// Appends mutations in order, coalescing each against pending entries.
    ///
    /// Returns the number of entries dropped by the length bound.
    pub fn enqueue(&mut self, mutations: impl IntoIterator<Item = Mutation>) -> usize {
        let mut added = 0usize;
        for mutation in mutations {
            self.entries.retain(|pending| !mutation.supersedes(pending));
            self.entries.push(mutation);
            added += 1;
        }
        if added == 0 {
            return 0;
        }

        let dropped = self.entries.len().saturating_sub(self.max_len);
        if dropped > 0 {
            self.entries.drain(..dropped);
            warn!(
                "event=queue_overflow module=sync status=dropped dropped={dropped} max_len={}",
                self.max_len
            );
        }
        debug!(
            "event=queue_enqueue module=sync status=ok added={added} pending={}",
            self.entries.len()
        );
        self.persist();
        dropped
    }

    /// Removes the entry with `mutation_id`; returns whether it was queued.
    pub fn remove(&mut self, mutation_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|pending| pending.id != mutation_id);
        let removed = self.entries.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Oldest pending mutation.
    pub fn head(&self) -> Option<&Mutation> {
        self.entries.first()
    }

    pub fn entries(&self) -> &[Mutation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn persist(&self) {
        let Some(persistence) = self.persistence.as_ref() else {
            return;
        };
        let result = if self.entries.is_empty() {
            persistence.store.remove(&persistence.key)
        } else {
            match serde_json::to_string(&self.entries) {
                Ok(raw) => persistence.store.set(&persistence.key, &raw),
                Err(err) => {
                    warn!("event=queue_persist module=sync status=error error={err}");
                    return;
                }
            }
        };
        if let Err(err) = result {
            warn!("event=queue_persist module=sync status=error error={err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{queue_key, MutationQueue};
    use crate::model::label::Label;
    use crate::model::mutation::{Mutation, MutationOp};
    use crate::model::note::Note;
    use crate::session::{Identity, SessionContext};
    use crate::storage::{KvStore, MemoryKvStore, StorageError, StorageResult};
    use std::rc::Rc;

    fn note(id: &str, body: &str) -> Note {
        Note {
            id: id.to_string(),
            title: String::new(),
            body: body.to_string(),
            label_ids: vec![],
            label_names: vec![],
            updated_at_ms: 1,
        }
    }

    fn ctx(uid: &str) -> SessionContext {
        SessionContext::new(Identity::new(uid), 1)
    }

    #[test]
    fn upserts_of_same_note_coalesce_to_latest() {
        let mut queue = MutationQueue::detached(250);
        queue.enqueue([Mutation::note_upsert("m1", note("n1", "v1"))]);
        queue.enqueue([Mutation::note_upsert("m2", note("n1", "v2"))]);

        assert_eq!(queue.len(), 1);
        match &queue.entries()[0].op {
            MutationOp::NoteUpsert { note } => assert_eq!(note.body, "v2"),
            other => panic!("unexpected op: {other:?}"),
        }
    }

    #[test]
    fn delete_supersedes_pending_upsert() {
        let mut queue = MutationQueue::detached(250);
        queue.enqueue([
            Mutation::note_upsert("m1", note("n1", "v1")),
            Mutation::note_delete("m2", "n1"),
        ]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.entries()[0].id, "m2");
    }

    #[test]
    fn coalescing_moves_entity_to_tail() {
        let mut queue = MutationQueue::detached(250);
        queue.enqueue([
            Mutation::note_upsert("m1", note("a", "1")),
            Mutation::note_upsert("m2", note("b", "1")),
            Mutation::note_upsert("m3", note("a", "2")),
        ]);
        let ids: Vec<&str> = queue.entries().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);
    }

    #[test]
    fn label_delete_removes_pending_label_writes_only() {
        let mut queue = MutationQueue::detached(250);
        queue.enqueue([
            Mutation::label_upsert("m1", Label::new("l1", "work")),
            Mutation::note_upsert("m2", note("l1", "same id, other kind")),
            Mutation::label_delete("m3", "l1"),
        ]);
        let ids: Vec<&str> = queue.entries().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);
    }

    #[test]
    fn overflow_keeps_most_recent_entries() {
        let mut queue = MutationQueue::detached(250);
        let dropped = queue.enqueue(
            (0..300).map(|i| Mutation::note_upsert(format!("m{i}"), note(&format!("n{i}"), "x"))),
        );
        assert_eq!(dropped, 50);
        assert_eq!(queue.len(), 250);
        assert_eq!(queue.head().unwrap().id, "m50");
        assert_eq!(queue.entries().last().unwrap().id, "m299");
    }

    #[test]
    fn remove_matches_by_mutation_id() {
        let mut queue = MutationQueue::detached(250);
        queue.enqueue([
            Mutation::note_upsert("m1", note("a", "1")),
            Mutation::note_upsert("m2", note("b", "1")),
        ]);
        assert!(queue.remove("m2"));
        assert!(!queue.remove("m2"));
        assert_eq!(queue.head().unwrap().id, "m1");
    }

    #[test]
    fn queue_persists_per_identity_and_reloads() {
        let store = Rc::new(MemoryKvStore::new());
        {
            let mut queue = MutationQueue::load(&ctx("alice"), store.clone(), 250);
            queue.enqueue([Mutation::note_upsert("m1", note("n1", "hello"))]);
        }

        let reloaded = MutationQueue::load(&ctx("alice"), store.clone(), 250);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.head().unwrap().id, "m1");

        let other = MutationQueue::load(&ctx("bob"), store.clone(), 250);
        assert!(other.is_empty());
    }

    #[test]
    fn empty_queue_removes_persisted_key() {
        let store = Rc::new(MemoryKvStore::new());
        let mut queue = MutationQueue::load(&ctx("alice"), store.clone(), 250);
        queue.enqueue([Mutation::note_delete("m1", "n1")]);
        assert!(store.get(&queue_key("alice")).unwrap().is_some());

        queue.remove("m1");
        assert!(store.get(&queue_key("alice")).unwrap().is_none());
    }

    #[test]
    fn corrupt_persisted_queue_loads_empty() {
        let store = Rc::new(MemoryKvStore::new());
        store.set(&queue_key("alice"), "{not json").unwrap();
        let queue = MutationQueue::load(&ctx("alice"), store, 250);
        assert!(queue.is_empty());
    }

    struct FailingStore;

    impl KvStore for FailingStore {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Unavailable("denied".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable("denied".to_string()))
        }

        fn remove(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable("denied".to_string()))
        }
    }

    #[test]
    fn storage_failures_do_not_block_queue_changes() {
        let mut queue = MutationQueue::load(&ctx("alice"), Rc::new(FailingStore), 250);
        assert!(queue.is_empty());
        queue.enqueue([Mutation::note_upsert("m1", note("n1", "x"))]);
        assert_eq!(queue.len(), 1);
    }
}
