//! Label model.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Label id placeholder for "no label" (legacy documents, filter buckets).
pub const NO_LABEL_ID: &str = "none";
/// Label name placeholder paired with `NO_LABEL_ID`.
pub const NO_LABEL_NAME: &str = "No label";

/// User-defined label that notes can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    /// Created locally and not yet confirmed by the remote store.
    ///
    /// Optimistic labels are protected from deletion until confirmed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_optimistic: bool,
}

impl Label {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_optimistic: false,
        }
    }

    /// Display order: name ascending, case-insensitive; id breaks ties.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Case-insensitive name comparison used for duplicate detection.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Sorts labels into display order in place.
pub fn sort_labels(labels: &mut [Label]) {
    labels.sort_by(Label::display_cmp);
}

#[cfg(test)]
mod tests {
    use super::{sort_labels, Label};

    #[test]
    fn labels_sort_case_insensitively() {
        let mut labels = vec![
            Label::new("l1", "work"),
            Label::new("l2", "Errands"),
            Label::new("l3", "archive"),
        ];
        sort_labels(&mut labels);
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["archive", "Errands", "work"]);
    }

    #[test]
    fn optimistic_flag_is_omitted_when_false() {
        let json = serde_json::to_string(&Label::new("l1", "work")).unwrap();
        assert_eq!(json, r#"{"id":"l1","name":"work"}"#);

        let parsed: Label = serde_json::from_str(r#"{"id":"l1","name":"work"}"#).unwrap();
        assert!(!parsed.is_optimistic);
    }
}
