//! One note editing session.
//!
//! The new-note form and the edit dialog each own a `NoteEditor`; their
//! histories never interact.

use crate::draft::{DraftHistory, DraftSnapshot};
use crate::model::note::Note;

#[derive(Debug, Clone)]
pub struct NoteEditor {
    note_id: Option<String>,
    history: DraftHistory,
    selected_label_ids: Vec<String>,
    max_history: usize,
}

impl NoteEditor {
    /// Blank editor for a new note.
    pub fn new(max_history: usize) -> Self {
        Self {
            note_id: None,
            history: DraftHistory::new(DraftSnapshot::default(), max_history),
            selected_label_ids: Vec::new(),
            max_history,
        }
    }

    /// Editor prefilled from an existing note.
    pub fn for_note(note: &Note, max_history: usize) -> Self {
        Self {
            note_id: Some(note.id.clone()),
            history: DraftHistory::new(
                DraftSnapshot::new(note.title.clone(), note.body.clone()),
                max_history,
            ),
            selected_label_ids: note.label_ids.clone(),
            max_history,
        }
    }

    /// Target note; `None` for a new note.
    pub fn note_id(&self) -> Option<&str> {
        self.note_id.as_deref()
    }

    pub fn draft(&self) -> &DraftSnapshot {
        self.history.current()
    }

    pub fn title(&self) -> &str {
        &self.history.current().title
    }

    pub fn body(&self) -> &str {
        &self.history.current().body
    }

    pub fn history(&self) -> &DraftHistory {
        &self.history
    }

    pub fn selected_label_ids(&self) -> &[String] {
        &self.selected_label_ids
    }

    pub fn is_selected(&self, label_id: &str) -> bool {
        self.selected_label_ids.iter().any(|id| id == label_id)
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> bool {
        let next = DraftSnapshot::new(title, self.body());
        self.history.record_change(next, false)
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> bool {
        let next = DraftSnapshot::new(self.title(), body);
        self.history.record_change(next, false)
    }

    /// Appends pasted text on its own line, as one undo step.
    pub fn paste(&mut self, text: &str) -> bool {
        let body = if self.body().is_empty() {
            text.to_string()
        } else {
            format!("{}\n{text}", self.body())
        };
        let next = DraftSnapshot::new(self.title(), body);
        self.history.record_change(next, true)
    }

    pub fn toggle_label(&mut self, label_id: &str) {
        if !self.remove_label(label_id) {
            self.selected_label_ids.push(label_id.to_string());
        }
    }

    /// Deselects a label, e.g. after it was deleted.
    pub fn remove_label(&mut self, label_id: &str) -> bool {
        let before = self.selected_label_ids.len();
        self.selected_label_ids.retain(|id| id != label_id);
        self.selected_label_ids.len() != before
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    /// Clears the form and its history.
    pub fn reset(&mut self) {
        self.note_id = None;
        self.selected_label_ids.clear();
        self.history = DraftHistory::new(DraftSnapshot::default(), self.max_history);
    }
}
