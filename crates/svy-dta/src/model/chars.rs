//! Characteristics: free-form per-variable and dataset-level annotations.
//!
//! Each record is (variable name | `_dta`, characteristic name, payload)
//! with a declared byte size. Notes are a naming convention inside
//! characteristics: `note0`'s payload is a decimal counter, and each note
//! is its own `note<N>` record appended in order.

use serde::{Deserialize, Serialize};

use crate::codec::truncate_text;
use crate::model::dictionary::{MAX_NAME_BYTES, MAX_NAME_CHARS};

/// Scope name for dataset-level characteristics.
pub const DATASET_SCOPE: &str = "_dta";

/// Fixed overhead of a record: two 129-byte name fields.
pub const RECORD_OVERHEAD: u64 = 258;

/// Maximum note payload in bytes; longer notes are truncated.
pub const MAX_NOTE_BYTES: usize = 67784;

/// One characteristic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
    /// Variable name, or [`DATASET_SCOPE`] for dataset-level records.
    pub variable: String,
    /// Characteristic name.
    pub name: String,
    /// Payload text.
    pub payload: String,
    /// Declared byte size as stored in the file.
    pub size: u64,
}

/// All characteristic records, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    records: Vec<Characteristic>,
}

impl Characteristics {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Characteristic] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Append a record, declaring its size as `258 + payload`.
    pub fn append(&mut self, variable: &str, name: &str, payload: &str) {
        let variable = truncate_text(variable, MAX_NAME_CHARS, MAX_NAME_BYTES).to_string();
        let name = truncate_text(name, MAX_NAME_CHARS, MAX_NAME_BYTES).to_string();
        let size = RECORD_OVERHEAD + payload.len() as u64;
        self.records.push(Characteristic {
            variable,
            name,
            payload: payload.to_string(),
            size,
        });
    }

    /// Append a record parsed from a file, keeping its declared size.
    pub(crate) fn append_raw(&mut self, record: Characteristic) {
        self.records.push(record);
    }

    pub fn get(&self, variable: &str, name: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|record| record.variable == variable && record.name == name)
            .map(|record| record.payload.as_str())
    }

    /// Number of notes attached to `scope` (a variable name or `_dta`),
    /// read from the `note0` counter record.
    pub fn note_count(&self, scope: &str) -> usize {
        self.get(scope, "note0")
            .and_then(|payload| payload.trim().parse::<usize>().ok())
            .unwrap_or(0)
    }

    /// Append a note to `scope`, creating or bumping the `note0` counter.
    ///
    /// The counter record declares `258 + payload + 1` bytes; note records
    /// declare `258 + payload`. Both are recomputed on every append. Notes
    /// longer than [`MAX_NOTE_BYTES`] are truncated.
    pub fn add_note(&mut self, scope: &str, text: &str) {
        let scope = truncate_text(scope, MAX_NAME_CHARS, MAX_NAME_BYTES).to_string();
        let text = truncate_text(text, usize::MAX, MAX_NOTE_BYTES);
        let next = self.note_count(&scope) + 1;

        let counter_payload = next.to_string();
        let counter_size = RECORD_OVERHEAD + counter_payload.len() as u64 + 1;
        let existing = self
            .records
            .iter_mut()
            .find(|record| record.variable == scope && record.name == "note0");
        match existing {
            Some(counter) => {
                counter.payload = counter_payload;
                counter.size = counter_size;
            }
            None => self.records.push(Characteristic {
                variable: scope.clone(),
                name: "note0".to_string(),
                payload: counter_payload,
                size: counter_size,
            }),
        }

        self.records.push(Characteristic {
            variable: scope,
            name: format!("note{next}"),
            payload: text.to_string(),
            size: RECORD_OVERHEAD + text.len() as u64,
        });
    }

    /// Notes attached to `scope`, in note order.
    pub fn notes(&self, scope: &str) -> Vec<&str> {
        let count = self.note_count(scope);
        (1..=count)
            .filter_map(|number| self.get(scope, &format!("note{number}")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_sets_declared_size() {
        let mut chars = Characteristics::default();
        chars.append("hhid", "source", "census frame");
        let record = &chars.records()[0];
        assert_eq!(record.size, 258 + 12);
        assert_eq!(chars.get("hhid", "source"), Some("census frame"));
    }

    #[test]
    fn test_notes_counter_convention() {
        let mut chars = Characteristics::default();
        chars.add_note(DATASET_SCOPE, "first note");
        chars.add_note(DATASET_SCOPE, "second note");

        assert_eq!(chars.note_count(DATASET_SCOPE), 2);
        assert_eq!(chars.get(DATASET_SCOPE, "note0"), Some("2"));
        assert_eq!(chars.notes(DATASET_SCOPE), vec!["first note", "second note"]);

        // Counter record declares one extra byte.
        let counter = chars
            .records()
            .iter()
            .find(|record| record.name == "note0")
            .unwrap();
        assert_eq!(counter.size, 258 + 1 + 1);
        let note = chars
            .records()
            .iter()
            .find(|record| record.name == "note1")
            .unwrap();
        assert_eq!(note.size, 258 + 10);
    }

    #[test]
    fn test_variable_and_dataset_notes_are_separate() {
        let mut chars = Characteristics::default();
        chars.add_note("age", "check outliers");
        chars.add_note(DATASET_SCOPE, "wave 3");

        assert_eq!(chars.notes("age"), vec!["check outliers"]);
        assert_eq!(chars.notes(DATASET_SCOPE), vec!["wave 3"]);
        assert_eq!(chars.note_count("weight"), 0);
    }
}
