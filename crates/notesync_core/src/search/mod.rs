//! Note filtering and label statistics.
//!
//! # Responsibility
//! - Narrow the displayed notes by keyword and label.
//! - Count notes per label for the label picker.
//!
//! # Invariants
//! - Matching is a case-insensitive substring test on title or body.
//! - Filtering never reorders notes.

use crate::model::label::NO_LABEL_ID;
use crate::model::note::Note;
use std::collections::BTreeMap;

/// Label restriction of a note filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LabelFilter {
    #[default]
    All,
    Only(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub keyword: String,
    pub label: LabelFilter,
}

impl NoteFilter {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            label: LabelFilter::All,
        }
    }

    pub fn label(label_id: impl Into<String>) -> Self {
        Self {
            keyword: String::new(),
            label: LabelFilter::Only(label_id.into()),
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        let in_label = match &self.label {
            LabelFilter::All => true,
            LabelFilter::Only(label_id) => note.has_label(label_id),
        };
        in_label && matches_keyword(note, &normalize_keyword(&self.keyword))
    }
}

fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

fn matches_keyword(note: &Note, needle: &str) -> bool {
    needle.is_empty()
        || note.title.to_lowercase().contains(needle)
        || note.body.to_lowercase().contains(needle)
}

/// Notes matching `filter`, in their given order.
pub fn filter_notes<'a>(notes: &'a [Note], filter: &NoteFilter) -> Vec<&'a Note> {
    notes.iter().filter(|note| filter.matches(note)).collect()
}

/// Per-label note counts; unlabelled notes are counted under `none`.
pub fn label_note_counts(notes: &[Note]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for note in notes {
        if note.label_ids.is_empty() {
            *counts.entry(NO_LABEL_ID.to_string()).or_insert(0) += 1;
            continue;
        }
        for label_id in &note.label_ids {
            *counts.entry(label_id.clone()).or_insert(0) += 1;
        }
    }
    counts
}
