//! In-process `RemoteStore` for tests, demos and offline replay.
//!
//! Behaves like the hosted document store where it matters to sync:
//! merge upserts, server-stamped `updatedAt`, ordered pages with cursors and
//! live snapshots pushed after every write. Reachability and write failures
//! can be scripted.

use crate::clock::{Clock, Stamper, SystemClock};
use futures_util::future::{FutureExt, LocalBoxFuture};
use crate::model::note::Note;
use crate::sync::remote::{
    LabelDocument, NoteDocument, NotesPage, PageCursor, RemoteError, RemoteLabel, RemoteNote,
    RemoteResult, RemoteStore, Subscription,
};
use log::debug;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    LabelUpsert,
    LabelDelete,
    NoteUpsert,
    NoteDelete,
}

/// One accepted write, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub kind: WriteKind,
    pub uid: String,
    pub id: String,
}

#[derive(Debug, Default)]
struct UserDocs {
    labels: BTreeMap<String, LabelDocument>,
    notes: BTreeMap<String, NoteDocument>,
}

struct NotesWatcher {
    uid: String,
    limit: usize,
    sender: mpsc::UnboundedSender<NotesPage>,
}

struct LabelsWatcher {
    uid: String,
    sender: mpsc::UnboundedSender<Vec<RemoteLabel>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct FailurePlan {
    successes_first: usize,
    failures: usize,
}

pub struct InMemoryRemoteStore {
    users: RefCell<HashMap<String, UserDocs>>,
    writes: RefCell<Vec<WriteRecord>>,
    label_watchers: RefCell<Vec<LabelsWatcher>>,
    note_watchers: RefCell<Vec<NotesWatcher>>,
    reachable: watch::Sender<bool>,
    failures: Cell<FailurePlan>,
    write_delay_ms: Cell<u64>,
    clock: Rc<dyn Clock>,
    stamper: Stamper,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    /// Stamps `updatedAt` from `clock`.
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        let (reachable, _) = watch::channel(true);
        Self {
            users: RefCell::new(HashMap::new()),
            writes: RefCell::new(Vec::new()),
            label_watchers: RefCell::new(Vec::new()),
            note_watchers: RefCell::new(Vec::new()),
            reachable,
            failures: Cell::new(FailurePlan::default()),
            write_delay_ms: Cell::new(0),
            clock,
            stamper: Stamper::new(),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.send_replace(reachable);
    }

    /// Reachability changes, for driving reconnect flushes.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.reachable.subscribe()
    }

    /// Fails the next `count` writes.
    pub fn fail_next_writes(&self, count: usize) {
        self.failures.set(FailurePlan {
            successes_first: 0,
            failures: count,
        });
    }

    /// Accepts `successes` writes, then fails one.
    pub fn fail_writes_after(&self, successes: usize) {
        self.failures.set(FailurePlan {
            successes_first: successes,
            failures: 1,
        });
    }

    /// Delays every write, so overlapping callers can be observed.
    pub fn set_write_delay_ms(&self, delay_ms: u64) {
        self.write_delay_ms.set(delay_ms);
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.borrow().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.borrow_mut().clear();
    }

    /// Stores a document as-is, bypassing merge and stamping.
    pub fn seed_note(&self, uid: &str, note_id: &str, doc: NoteDocument) {
        self.users
            .borrow_mut()
            .entry(uid.to_string())
            .or_default()
            .notes
            .insert(note_id.to_string(), doc);
        self.publish_notes(uid);
    }

    pub fn seed_label(&self, uid: &str, label_id: &str, name: &str) {
        let doc = LabelDocument {
            name: Some(name.to_string()),
            updated_at: Some(self.stamper.next(self.clock.now_ms())),
        };
        self.users
            .borrow_mut()
            .entry(uid.to_string())
            .or_default()
            .labels
            .insert(label_id.to_string(), doc);
        self.publish_labels(uid);
    }

    pub fn note_document(&self, uid: &str, note_id: &str) -> Option<NoteDocument> {
        self.users
            .borrow()
            .get(uid)
            .and_then(|docs| docs.notes.get(note_id).cloned())
    }

    pub fn label_document(&self, uid: &str, label_id: &str) -> Option<LabelDocument> {
        self.users
            .borrow()
            .get(uid)
            .and_then(|docs| docs.labels.get(label_id).cloned())
    }

    pub fn note_count(&self, uid: &str) -> usize {
        self.users
            .borrow()
            .get(uid)
            .map(|docs| docs.notes.len())
            .unwrap_or(0)
    }

    pub fn label_count(&self, uid: &str) -> usize {
        self.users
            .borrow()
            .get(uid)
            .map(|docs| docs.labels.len())
            .unwrap_or(0)
    }

    async fn admit_write(&self) -> RemoteResult<()> {
        let delay_ms = self.write_delay_ms.get();
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if !*self.reachable.borrow() {
            return Err(RemoteError::Unavailable);
        }
        let mut plan = self.failures.get();
        if plan.failures > 0 {
            if plan.successes_first > 0 {
                plan.successes_first -= 1;
            } else {
                plan.failures -= 1;
                self.failures.set(plan);
                return Err(RemoteError::Unavailable);
            }
            self.failures.set(plan);
        }
        Ok(())
    }

    fn record(&self, kind: WriteKind, uid: &str, id: &str) {
        debug!("event=remote_write module=sync status=ok kind={kind:?} id={id}");
        self.writes.borrow_mut().push(WriteRecord {
            kind,
            uid: uid.to_string(),
            id: id.to_string(),
        });
    }

    fn labels_snapshot(&self, uid: &str) -> Vec<RemoteLabel> {
        self.users
            .borrow()
            .get(uid)
            .map(|docs| {
                docs.labels
                    .iter()
                    .map(|(id, doc)| RemoteLabel {
                        id: id.clone(),
                        doc: doc.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn notes_page(&self, uid: &str, after: Option<&PageCursor>, limit: usize) -> NotesPage {
        let users = self.users.borrow();
        let Some(docs) = users.get(uid) else {
            return NotesPage::default();
        };
        let mut ordered: Vec<(Note, &NoteDocument)> = docs
            .notes
            .iter()
            .map(|(id, doc)| (doc.to_note(id), doc))
            .collect();
        ordered.sort_by(|left, right| left.0.display_cmp(&right.0));
        let notes = ordered
            .into_iter()
            .filter(|(note, _)| after.map_or(true, |cursor| is_after(note, cursor)))
            .take(limit)
            .map(|(note, doc)| RemoteNote {
                id: note.id,
                doc: doc.clone(),
            })
            .collect();
        NotesPage::new(notes)
    }

    fn publish_labels(&self, uid: &str) {
        let snapshot = self.labels_snapshot(uid);
        self.label_watchers.borrow_mut().retain(|watcher| {
            watcher.uid != uid || watcher.sender.send(snapshot.clone()).is_ok()
        });
    }

    fn publish_notes(&self, uid: &str) {
        let mut watchers = self.note_watchers.borrow_mut();
        watchers.retain(|watcher| {
            watcher.uid != uid
                || watcher
                    .sender
                    .send(self.notes_page(uid, None, watcher.limit))
                    .is_ok()
        });
    }
}

/// Whether `note` sorts strictly after `cursor` in `updatedAtMs DESC` order.
fn is_after(note: &Note, cursor: &PageCursor) -> bool {
    match cursor.updated_at_ms.cmp(&note.updated_at_ms) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => note.id > cursor.id,
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn is_reachable(&self) -> bool {
        *self.reachable.borrow()
    }

    fn upsert_label<'a>(
        &'a self,
        uid: &'a str,
        label_id: &'a str,
        doc: LabelDocument,
    ) -> LocalBoxFuture<'a, RemoteResult<()>> {
        async move {
            self.admit_write().await?;
            {
                let mut users = self.users.borrow_mut();
                let stored = users
                    .entry(uid.to_string())
                    .or_default()
                    .labels
                    .entry(label_id.to_string())
                    .or_default();
                if doc.name.is_some() {
                    stored.name = doc.name;
                }
                stored.updated_at = Some(self.stamper.next(self.clock.now_ms()));
            }
            self.record(WriteKind::LabelUpsert, uid, label_id);
            self.publish_labels(uid);
            Ok(())
        }
        .boxed_local()
    }

    fn delete_label<'a>(
        &'a self,
        uid: &'a str,
        label_id: &'a str,
    ) -> LocalBoxFuture<'a, RemoteResult<()>> {
        async move {
            self.admit_write().await?;
            if let Some(docs) = self.users.borrow_mut().get_mut(uid) {
                docs.labels.remove(label_id);
            }
            self.record(WriteKind::LabelDelete, uid, label_id);
            self.publish_labels(uid);
            Ok(())
        }
        .boxed_local()
    }

    fn upsert_note<'a>(
        &'a self,
        uid: &'a str,
        note_id: &'a str,
        doc: NoteDocument,
    ) -> LocalBoxFuture<'a, RemoteResult<()>> {
        async move {
            self.admit_write().await?;
            {
                let mut users = self.users.borrow_mut();
                let stored = users
                    .entry(uid.to_string())
                    .or_default()
                    .notes
                    .entry(note_id.to_string())
                    .or_default();
                stored.merge(doc);
                stored.updated_at = Some(self.stamper.next(self.clock.now_ms()));
            }
            self.record(WriteKind::NoteUpsert, uid, note_id);
            self.publish_notes(uid);
            Ok(())
        }
        .boxed_local()
    }

    fn delete_note<'a>(
        &'a self,
        uid: &'a str,
        note_id: &'a str,
    ) -> LocalBoxFuture<'a, RemoteResult<()>> {
        async move {
            self.admit_write().await?;
            if let Some(docs) = self.users.borrow_mut().get_mut(uid) {
                docs.notes.remove(note_id);
            }
            self.record(WriteKind::NoteDelete, uid, note_id);
            self.publish_notes(uid);
            Ok(())
        }
        .boxed_local()
    }

    fn fetch_notes_page<'a>(
        &'a self,
        uid: &'a str,
        after: Option<PageCursor>,
        limit: usize,
    ) -> LocalBoxFuture<'a, RemoteResult<NotesPage>> {
        async move {
            if !self.is_reachable() {
                return Err(RemoteError::Unavailable);
            }
            Ok(self.notes_page(uid, after.as_ref(), limit))
        }
        .boxed_local()
    }

    fn watch_labels(&self, uid: &str) -> Subscription<Vec<RemoteLabel>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if sender.send(self.labels_snapshot(uid)).is_ok() {
            self.label_watchers.borrow_mut().push(LabelsWatcher {
                uid: uid.to_string(),
                sender,
            });
        }
        receiver
    }

    fn watch_notes(&self, uid: &str, limit: usize) -> Subscription<NotesPage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if sender.send(self.notes_page(uid, None, limit)).is_ok() {
            self.note_watchers.borrow_mut().push(NotesWatcher {
                uid: uid.to_string(),
                limit,
                sender,
            });
        }
        receiver
    }
}
