//! Optimistic projection of pending mutations over a base snapshot.
//!
//! # Invariants
//! - Projection is pure: equal inputs give equal outputs.
//! - Mutations apply in queue order, so later entries win.
//! - A `label_delete` strips the label from every note in the same pass,
//!   using `Note::strip_label`.

use crate::model::label::{sort_labels, Label};
use crate::model::mutation::{Mutation, MutationOp};
use crate::model::note::{sort_notes, Note};
use std::collections::HashMap;

/// What the UI renders: base snapshot with pending mutations overlaid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub labels: Vec<Label>,
    pub notes: Vec<Note>,
}

/// Projects both collections.
pub fn project(base_labels: &[Label], base_notes: &[Note], queue: &[Mutation]) -> DisplayState {
    DisplayState {
        labels: project_labels(base_labels, queue),
        notes: project_notes(base_notes, queue),
    }
}

/// Labels in display order; labels upserted by the queue are optimistic.
pub fn project_labels(base: &[Label], queue: &[Mutation]) -> Vec<Label> {
    let mut by_id: HashMap<&str, Label> = base
        .iter()
        .map(|label| (label.id.as_str(), label.clone()))
        .collect();

    for mutation in queue {
        match &mutation.op {
            MutationOp::LabelUpsert { label } => {
                by_id.insert(
                    label.id.as_str(),
                    Label {
                        is_optimistic: true,
                        ..label.clone()
                    },
                );
            }
            MutationOp::LabelDelete { label_id } => {
                by_id.remove(label_id.as_str());
            }
            MutationOp::NoteUpsert { .. } | MutationOp::NoteDelete { .. } => {}
        }
    }

    let mut labels: Vec<Label> = by_id.into_values().collect();
    sort_labels(&mut labels);
    labels
}

/// Notes in display order (newest first).
pub fn project_notes(base: &[Note], queue: &[Mutation]) -> Vec<Note> {
    let mut by_id: HashMap<&str, Note> = base
        .iter()
        .map(|note| (note.id.as_str(), note.clone()))
        .collect();

    for mutation in queue {
        match &mutation.op {
            MutationOp::NoteUpsert { note } => {
                by_id.insert(note.id.as_str(), note.clone());
            }
            MutationOp::NoteDelete { note_id } => {
                by_id.remove(note_id.as_str());
            }
            MutationOp::LabelDelete { label_id } => {
                for note in by_id.values_mut() {
                    note.strip_label(label_id);
                }
            }
            MutationOp::LabelUpsert { .. } => {}
        }
    }

    let mut notes: Vec<Note> = by_id.into_values().collect();
    sort_notes(&mut notes);
    notes
}

/// Folds a mutation the remote store has acknowledged into the base.
///
/// Keeps displayed state stable between the write succeeding and the next
/// pushed snapshot arriving.
pub fn apply_acknowledged(labels: &mut Vec<Label>, notes: &mut Vec<Note>, mutation: &Mutation) {
    match &mutation.op {
        MutationOp::LabelUpsert { label } => {
            let confirmed = Label {
                is_optimistic: false,
                ..label.clone()
            };
            match labels.iter_mut().find(|existing| existing.id == label.id) {
                Some(existing) => *existing = confirmed,
                None => labels.push(confirmed),
            }
            sort_labels(labels);
        }
        MutationOp::LabelDelete { label_id } => {
            labels.retain(|label| &label.id != label_id);
            for note in notes.iter_mut() {
                note.strip_label(label_id);
            }
        }
        MutationOp::NoteUpsert { note } => {
            match notes.iter_mut().find(|existing| existing.id == note.id) {
                Some(existing) => *existing = note.clone(),
                None => notes.push(note.clone()),
            }
            sort_notes(notes);
        }
        MutationOp::NoteDelete { note_id } => {
            notes.retain(|note| &note.id != note_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_acknowledged, project, project_labels, project_notes};
    use crate::model::label::Label;
    use crate::model::mutation::Mutation;
    use crate::model::note::Note;

    fn note(id: &str, updated_at_ms: i64, labels: &[(&str, &str)]) -> Note {
        Note {
            id: id.to_string(),
            title: format!("title {id}"),
            body: format!("body {id}"),
            label_ids: labels.iter().map(|(id, _)| id.to_string()).collect(),
            label_names: labels.iter().map(|(_, name)| name.to_string()).collect(),
            updated_at_ms,
        }
    }

    #[test]
    fn projection_is_idempotent() {
        let base = vec![note("a", 1, &[("l1", "work")]), note("b", 2, &[])];
        let queue = vec![
            Mutation::note_upsert("m1", note("c", 3, &[])),
            Mutation::label_delete("m2", "l1"),
            Mutation::note_delete("m3", "b"),
        ];
        let labels = vec![Label::new("l1", "work")];

        let first = project(&labels, &base, &queue);
        let second = project(&labels, &base, &queue);
        assert_eq!(first, second);
    }

    #[test]
    fn label_delete_cascades_into_notes() {
        let base = vec![note("n1", 1, &[("L1", "work"), ("L2", "home")])];
        let queue = vec![Mutation::label_delete("m1", "L1")];

        let projected = project_notes(&base, &queue);
        assert_eq!(projected[0].label_ids, vec!["L2"]);
        assert_eq!(projected[0].label_names, vec!["home"]);
    }

    #[test]
    fn later_mutations_win() {
        let base = vec![note("n1", 1, &[])];
        let queue = vec![
            Mutation::note_delete("m1", "n1"),
            Mutation::note_upsert("m2", note("n1", 5, &[])),
        ];
        let projected = project_notes(&base, &queue);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].updated_at_ms, 5);
    }

    #[test]
    fn notes_are_newest_first_and_labels_by_name() {
        let notes = project_notes(
            &[note("old", 1, &[])],
            &[Mutation::note_upsert("m1", note("new", 9, &[]))],
        );
        assert_eq!(notes[0].id, "new");

        let labels = project_labels(
            &[Label::new("l1", "Zeta")],
            &[Mutation::label_upsert("m1", Label::new("l2", "alpha"))],
        );
        assert_eq!(labels[0].name, "alpha");
        assert!(labels[0].is_optimistic);
        assert!(!labels[1].is_optimistic);
    }

    #[test]
    fn acknowledged_label_upsert_is_no_longer_optimistic() {
        let mut labels = vec![];
        let mut notes = vec![];
        apply_acknowledged(
            &mut labels,
            &mut notes,
            &Mutation::label_upsert("m1", Label::new("l1", "work")),
        );
        assert_eq!(labels, vec![Label::new("l1", "work")]);
    }

    #[test]
    fn acknowledged_label_delete_uses_same_cascade() {
        let mut labels = vec![Label::new("L1", "work")];
        let mut notes = vec![note("n1", 1, &[("L1", "work"), ("L2", "home")])];
        let mutation = Mutation::label_delete("m1", "L1");

        let optimistic = project_notes(&notes, std::slice::from_ref(&mutation));
        apply_acknowledged(&mut labels, &mut notes, &mutation);

        assert!(labels.is_empty());
        assert_eq!(notes, optimistic);
    }
}
