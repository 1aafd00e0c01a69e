//! Remote document store seam and wire documents.
//!
//! # Responsibility
//! - Define the per-identity `labels`/`notes` collection API.
//! - Map stored documents to domain records, tolerating legacy shapes.
//!
//! # Invariants
//! - Upserts are merge writes: `None` fields are left untouched remotely.
//! - The store stamps `updatedAt` itself; clients never send it.
//! - Dropping a `Subscription` ends that live query.

use crate::error::ErrorClass;
use futures_util::future::LocalBoxFuture;
use crate::model::label::{Label, NO_LABEL_ID, NO_LABEL_NAME};
use crate::model::note::Note;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Live query handle; yields a full snapshot on every remote change.
pub type Subscription<T> = mpsc::UnboundedReceiver<T>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Store not reachable (offline, DNS, timeout).
    Unavailable,
    /// Store answered but refused the request.
    Rejected(String),
}

impl RemoteError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::RecoverableLocal
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "remote store unavailable"),
            Self::Rejected(message) => write!(f, "remote store rejected request: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// Stored label fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Server-assigned write time (epoch ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl LabelDocument {
    pub fn from_label(label: &Label) -> Self {
        Self {
            name: Some(label.name.clone()),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLabel {
    pub id: String,
    pub doc: LabelDocument,
}

impl RemoteLabel {
    pub fn to_label(&self) -> Label {
        Label::new(self.id.clone(), self.doc.name.clone().unwrap_or_default())
    }
}

/// Stored note fields.
///
/// `label_id`/`label_name` are the single-label shape older clients wrote;
/// they are still written (first label, or the "none" placeholders) and are
/// read back when the list fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl NoteDocument {
    /// Full merge write for `note`, including legacy single-label fields.
    pub fn from_note(note: &Note) -> Self {
        Self {
            title: Some(note.title.clone()),
            body: Some(note.body.clone()),
            label_ids: Some(note.label_ids.clone()),
            label_names: Some(note.label_names.clone()),
            label_id: Some(
                note.label_ids
                    .first()
                    .cloned()
                    .unwrap_or_else(|| NO_LABEL_ID.to_string()),
            ),
            label_name: Some(
                note.label_names
                    .first()
                    .cloned()
                    .unwrap_or_else(|| NO_LABEL_NAME.to_string()),
            ),
            updated_at_ms: Some(note.updated_at_ms),
            updated_at: None,
        }
    }

    /// Overwrites every field that `incoming` specifies.
    pub fn merge(&mut self, incoming: NoteDocument) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.title, incoming.title);
        take(&mut self.body, incoming.body);
        take(&mut self.label_ids, incoming.label_ids);
        take(&mut self.label_names, incoming.label_names);
        take(&mut self.label_id, incoming.label_id);
        take(&mut self.label_name, incoming.label_name);
        take(&mut self.updated_at_ms, incoming.updated_at_ms);
        take(&mut self.updated_at, incoming.updated_at);
    }

    /// Maps a stored document to a note, filling gaps from legacy fields.
    pub fn to_note(&self, id: &str) -> Note {
        let mut label_ids: Vec<String> = match self.label_ids.as_ref() {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => self
                .label_id
                .iter()
                .filter(|id| id.as_str() != NO_LABEL_ID)
                .cloned()
                .collect(),
        };
        let mut label_names: Vec<String> = match self.label_names.as_ref() {
            Some(names) if !names.is_empty() => names.clone(),
            _ => self
                .label_name
                .iter()
                .filter(|name| name.as_str() != NO_LABEL_NAME)
                .cloned()
                .collect(),
        };
        // Malformed documents may disagree on length; keep the lists parallel.
        let paired = label_ids.len().min(label_names.len());
        label_ids.truncate(paired);
        label_names.truncate(paired);
        Note {
            id: id.to_string(),
            title: self.title.clone().unwrap_or_default(),
            body: self.body.clone().unwrap_or_default(),
            label_ids,
            label_names,
            updated_at_ms: self.updated_at_ms.or(self.updated_at).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNote {
    pub id: String,
    pub doc: NoteDocument,
}

impl RemoteNote {
    pub fn to_note(&self) -> Note {
        self.doc.to_note(&self.id)
    }
}

/// Position after the last document of a page, in `updatedAtMs DESC` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub updated_at_ms: i64,
    pub id: String,
}

impl PageCursor {
    pub fn after(note: &Note) -> Self {
        Self {
            updated_at_ms: note.updated_at_ms,
            id: note.id.clone(),
        }
    }
}

/// One ordered page of notes (`updatedAtMs DESC`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesPage {
    pub notes: Vec<RemoteNote>,
}

impl NotesPage {
    pub fn new(notes: Vec<RemoteNote>) -> Self {
        Self { notes }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Cursor from the last document of the page.
    pub fn cursor(&self) -> Option<PageCursor> {
        self.notes.last().map(|last| PageCursor::after(&last.to_note()))
    }

    pub fn to_notes(&self) -> Vec<Note> {
        self.notes.iter().map(RemoteNote::to_note).collect()
    }
}

/// Per-identity document store.
pub trait RemoteStore {
    fn is_reachable(&self) -> bool;

    fn upsert_label<'a>(
        &'a self,
        uid: &'a str,
        label_id: &'a str,
        doc: LabelDocument,
    ) -> LocalBoxFuture<'a, RemoteResult<()>>;

    fn delete_label<'a>(
        &'a self,
        uid: &'a str,
        label_id: &'a str,
    ) -> LocalBoxFuture<'a, RemoteResult<()>>;

    fn upsert_note<'a>(
        &'a self,
        uid: &'a str,
        note_id: &'a str,
        doc: NoteDocument,
    ) -> LocalBoxFuture<'a, RemoteResult<()>>;

    fn delete_note<'a>(&'a self, uid: &'a str, note_id: &'a str)
        -> LocalBoxFuture<'a, RemoteResult<()>>;

    /// One-shot page of notes strictly after `after`.
    fn fetch_notes_page<'a>(
        &'a self,
        uid: &'a str,
        after: Option<PageCursor>,
        limit: usize,
    ) -> LocalBoxFuture<'a, RemoteResult<NotesPage>>;

    /// Live label collection.
    fn watch_labels(&self, uid: &str) -> Subscription<Vec<RemoteLabel>>;

    /// Live first page of notes, newest first, at most `limit` documents.
    fn watch_notes(&self, uid: &str, limit: usize) -> Subscription<NotesPage>;
}

#[cfg(test)]
mod tests {
    use super::{NoteDocument, NotesPage, RemoteNote};
    use crate::model::note::Note;
    use serde_json::json;

    #[test]
    fn from_note_writes_legacy_first_label_fields() {
        let note = Note {
            id: "n1".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            label_ids: vec![],
            label_names: vec![],
            updated_at_ms: 9,
        };
        let value = serde_json::to_value(NoteDocument::from_note(&note)).unwrap();
        assert_eq!(value["labelId"], "none");
        assert_eq!(value["labelName"], "No label");
        assert_eq!(value["updatedAtMs"], 9);
        assert!(value.get("updatedAt").is_none());
    }

    #[test]
    fn legacy_single_label_document_maps_to_lists() {
        let doc: NoteDocument = serde_json::from_value(json!({
            "body": "old note",
            "labelId": "l1",
            "labelName": "work",
            "updatedAt": 1234
        }))
        .unwrap();
        let note = doc.to_note("n1");
        assert_eq!(note.title, "");
        assert_eq!(note.label_ids, vec!["l1"]);
        assert_eq!(note.label_names, vec!["work"]);
        assert_eq!(note.updated_at_ms, 1234);
    }

    #[test]
    fn legacy_placeholders_map_to_no_labels() {
        let doc: NoteDocument = serde_json::from_value(json!({
            "body": "x",
            "labelId": "none",
            "labelName": "No label"
        }))
        .unwrap();
        let note = doc.to_note("n1");
        assert!(note.label_ids.is_empty());
        assert!(note.label_names.is_empty());
        assert_eq!(note.updated_at_ms, 0);
    }

    #[test]
    fn merge_only_touches_specified_fields() {
        let mut stored = NoteDocument {
            title: Some("keep".to_string()),
            body: Some("old".to_string()),
            ..NoteDocument::default()
        };
        stored.merge(NoteDocument {
            body: Some("new".to_string()),
            ..NoteDocument::default()
        });
        assert_eq!(stored.title.as_deref(), Some("keep"));
        assert_eq!(stored.body.as_deref(), Some("new"));
    }

    #[test]
    fn page_cursor_points_at_last_document() {
        let page = NotesPage::new(vec![
            RemoteNote {
                id: "a".to_string(),
                doc: NoteDocument {
                    updated_at_ms: Some(20),
                    ..NoteDocument::default()
                },
            },
            RemoteNote {
                id: "b".to_string(),
                doc: NoteDocument {
                    updated_at_ms: Some(10),
                    ..NoteDocument::default()
                },
            },
        ]);
        let cursor = page.cursor().unwrap();
        assert_eq!(cursor.id, "b");
        assert_eq!(cursor.updated_at_ms, 10);
    }
}
