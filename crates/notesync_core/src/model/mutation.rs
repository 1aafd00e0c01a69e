//! Intended changes queued for delivery to the remote store.
//!
//! # Invariants
//! - A mutation is immutable once created.
//! - `Mutation::id` identifies the queue entry, not the entity it targets.
//! - Serialized form is a flat object `{ "id", "type", ... }` so persisted
//!   queues stay readable by older builds.

use crate::model::label::Label;
use crate::model::note::Note;
use serde::{Deserialize, Serialize};

/// One queued change with its locally generated queue id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub id: String,
    #[serde(flatten)]
    pub op: MutationOp,
}

/// The four kinds of change the sync engine can deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationOp {
    LabelUpsert {
        label: Label,
    },
    LabelDelete {
        #[serde(rename = "labelId")]
        label_id: String,
    },
    NoteUpsert {
        note: Note,
    },
    NoteDelete {
        #[serde(rename = "noteId")]
        note_id: String,
    },
}

/// Entity addressed by a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef<'a> {
    Label(&'a str),
    Note(&'a str),
}

impl Mutation {
    pub fn new(id: impl Into<String>, op: MutationOp) -> Self {
        Self { id: id.into(), op }
    }

    pub fn label_upsert(id: impl Into<String>, label: Label) -> Self {
        Self::new(id, MutationOp::LabelUpsert { label })
    }

    pub fn label_delete(id: impl Into<String>, label_id: impl Into<String>) -> Self {
        Self::new(
            id,
            MutationOp::LabelDelete {
                label_id: label_id.into(),
            },
        )
    }

    pub fn note_upsert(id: impl Into<String>, note: Note) -> Self {
        Self::new(id, MutationOp::NoteUpsert { note })
    }

    pub fn note_delete(id: impl Into<String>, note_id: impl Into<String>) -> Self {
        Self::new(
            id,
            MutationOp::NoteDelete {
                note_id: note_id.into(),
            },
        )
    }

    /// Entity this mutation writes to.
    pub fn target(&self) -> EntityRef<'_> {
        match &self.op {
            MutationOp::LabelUpsert { label } => EntityRef::Label(&label.id),
            MutationOp::LabelDelete { label_id } => EntityRef::Label(label_id),
            MutationOp::NoteUpsert { note } => EntityRef::Note(&note.id),
            MutationOp::NoteDelete { note_id } => EntityRef::Note(note_id),
        }
    }

    /// Short kind tag, matching the serialized `type` field.
    pub fn kind(&self) -> &'static str {
        match &self.op {
            MutationOp::LabelUpsert { .. } => "label_upsert",
            MutationOp::LabelDelete { .. } => "label_delete",
            MutationOp::NoteUpsert { .. } => "note_upsert",
            MutationOp::NoteDelete { .. } => "note_delete",
        }
    }

    /// Whether enqueueing `self` makes the already queued `earlier` obsolete.
    ///
    /// Upserts replace earlier upserts of the same entity; deletes replace
    /// every earlier pending write of the same entity.
    pub fn supersedes(&self, earlier: &Mutation) -> bool {
        let is_delete = matches!(
            self.op,
            MutationOp::LabelDelete { .. } | MutationOp::NoteDelete { .. }
        );
        let earlier_is_upsert = matches!(
            earlier.op,
            MutationOp::LabelUpsert { .. } | MutationOp::NoteUpsert { .. }
        );
        if !is_delete && !earlier_is_upsert {
            return false;
        }
        self.target() == earlier.target()
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityRef, Mutation};
    use crate::model::label::Label;
    use crate::model::note::Note;
    use serde_json::json;

    fn note(id: &str) -> Note {
        Note {
            id: id.to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            label_ids: vec![],
            label_names: vec![],
            updated_at_ms: 7,
        }
    }

    #[test]
    fn serializes_as_flat_tagged_object() {
        let mutation = Mutation::label_delete("mutation-1", "label-1");
        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(
            value,
            json!({ "id": "mutation-1", "type": "label_delete", "labelId": "label-1" })
        );

        let parsed: Mutation = serde_json::from_value(json!({
            "id": "mutation-2",
            "type": "note_upsert",
            "note": {
                "id": "note-1",
                "title": "t",
                "body": "b",
                "labelIds": [],
                "labelNames": [],
                "updatedAtMs": 7
            }
        }))
        .unwrap();
        assert_eq!(parsed, Mutation::note_upsert("mutation-2", note("note-1")));
    }

    #[test]
    fn target_distinguishes_labels_from_notes_with_same_id() {
        let label = Mutation::label_upsert("m1", Label::new("x", "work"));
        let note_delete = Mutation::note_delete("m2", "x");
        assert_eq!(label.target(), EntityRef::Label("x"));
        assert_ne!(label.target(), note_delete.target());
        assert!(!note_delete.supersedes(&label));
    }

    #[test]
    fn upsert_does_not_supersede_pending_delete() {
        let delete = Mutation::note_delete("m1", "n1");
        let upsert = Mutation::note_upsert("m2", note("n1"));
        assert!(!upsert.supersedes(&delete));
        assert!(delete.supersedes(&upsert));
    }
}
