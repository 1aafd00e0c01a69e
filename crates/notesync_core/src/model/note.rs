//! Note model.
//!
//! # Invariants
//! - `label_ids.len() == label_names.len()`; index `i` of both lists refers to
//!   the same label.
//! - `updated_at_ms` is the only ordering key (display descending, and
//!   last-writer-wins resolution).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One synced note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub label_names: Vec<String>,
    #[serde(default)]
    pub updated_at_ms: i64,
}

impl Note {
    /// Whether this note carries the label.
    pub fn has_label(&self, label_id: &str) -> bool {
        self.label_ids.iter().any(|id| id == label_id)
    }

    /// Removes `label_id` from both label lists, keeping them parallel.
    ///
    /// This is the single cascade rule for label deletion: the projector runs
    /// it over every displayed note and the client runs it to build the
    /// follow-up note writes. Returns whether the note changed.
    pub fn strip_label(&mut self, label_id: &str) -> bool {
        let mut changed = false;
        while let Some(index) = self.label_ids.iter().position(|id| id == label_id) {
            self.label_ids.remove(index);
            if index < self.label_names.len() {
                self.label_names.remove(index);
            }
            changed = true;
        }
        changed
    }

    /// Display order: newest first; id breaks ties so output is deterministic.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        other
            .updated_at_ms
            .cmp(&self.updated_at_ms)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sorts notes into display order in place.
pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(Note::display_cmp);
}
