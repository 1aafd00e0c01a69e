//! Base snapshot tracking for the live label/note subscriptions.
//!
//! # Responsibility
//! - Replace the base labels on every pushed label snapshot.
//! - Merge the live first page of notes with older pages fetched on demand.
//! - Track the pagination cursor and "more available" flag.
//!
//! # Invariants
//! - Older loaded notes that are in neither the previous nor the next first
//!   page survive a first-page change.
//! - Page fetches merge by id and never duplicate a known note.
//! - At most one older-page fetch is in flight.

use crate::model::label::{sort_labels, Label};
use crate::model::mutation::Mutation;
use crate::model::note::{sort_notes, Note};
use crate::session::SessionContext;
use crate::sync::projector::apply_acknowledged;
use crate::sync::remote::{NotesPage, PageCursor, RemoteLabel};
use log::debug;
use std::collections::HashSet;

pub struct SnapshotListener {
    ctx: SessionContext,
    page_size: usize,
    labels: Vec<Label>,
    notes: Vec<Note>,
    first_page_ids: HashSet<String>,
    cursor: Option<PageCursor>,
    has_more: bool,
    loading_more: bool,
    first_page_loaded: bool,
}

impl SnapshotListener {
    pub fn new(ctx: SessionContext, page_size: usize) -> Self {
        Self {
            ctx,
            page_size,
            labels: Vec::new(),
            notes: Vec::new(),
            first_page_ids: HashSet::new(),
            cursor: None,
            has_more: false,
            loading_more: false,
            first_page_loaded: false,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn base_labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn base_notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn on_labels_snapshot(&mut self, docs: &[RemoteLabel]) {
        let mut labels: Vec<Label> = docs.iter().map(RemoteLabel::to_label).collect();
        sort_labels(&mut labels);
        self.labels = labels;
        debug!(
            "event=labels_snapshot module=sync status=ok count={}",
            self.labels.len()
        );
    }

    /// Applies a pushed snapshot of the live first page.
    pub fn on_first_page(&mut self, page: &NotesPage) {
        let incoming = page.to_notes();
        let next_ids: HashSet<String> = incoming.iter().map(|note| note.id.clone()).collect();
        let previous_ids = std::mem::replace(&mut self.first_page_ids, next_ids);

        let preserved: Vec<Note> = self
            .notes
            .drain(..)
            .filter(|note| {
                !previous_ids.contains(&note.id) && !self.first_page_ids.contains(&note.id)
            })
            .collect();

        let mut notes = incoming;
        notes.extend(preserved);
        sort_notes(&mut notes);
        self.notes = notes;

        self.has_more = page.len() == self.page_size;
        self.cursor = page.cursor();
        self.first_page_loaded = true;
        debug!(
            "event=notes_snapshot module=sync status=ok first_page={} total={} has_more={}",
            page.len(),
            self.notes.len(),
            self.has_more
        );
    }

    /// Reserves the single older-page fetch slot.
    ///
    /// Returns the cursor to fetch after, or `None` when nothing more can be
    /// loaded or a fetch is already running.
    pub fn begin_load_more(&mut self) -> Option<PageCursor> {
        if self.loading_more || !self.has_more {
            return None;
        }
        let cursor = self.cursor.clone()?;
        self.loading_more = true;
        Some(cursor)
    }

    /// Merges a fetched older page; returns how many notes were new.
    pub fn finish_load_more(&mut self, page: &NotesPage) -> usize {
        self.loading_more = false;
        let known: HashSet<String> = self.notes.iter().map(|note| note.id.clone()).collect();
        let fresh: Vec<Note> = page
            .to_notes()
            .into_iter()
            .filter(|note| !known.contains(&note.id))
            .collect();
        let added = fresh.len();
        self.notes.extend(fresh);
        sort_notes(&mut self.notes);

        if let Some(cursor) = page.cursor() {
            self.cursor = Some(cursor);
        }
        self.has_more = page.len() == self.page_size;
        added
    }

    /// Releases the fetch slot after a failed fetch.
    pub fn abort_load_more(&mut self) {
        self.loading_more = false;
    }

    /// Folds an acknowledged write into the base.
    pub fn acknowledge(&mut self, mutation: &Mutation) {
        apply_acknowledged(&mut self.labels, &mut self.notes, mutation);
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn first_page_loaded(&self) -> bool {
        self.first_page_loaded
    }

    pub fn cursor(&self) -> Option<&PageCursor> {
        self.cursor.as_ref()
    }
}
