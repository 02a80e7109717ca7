//! Value-label tables (enumerations).
//!
//! A table maps integer keys to label strings and is referenced from
//! dictionary entries by name. Entry order is preserved: it is the
//! emission order of the offset/key tables in the `<lbl>` block.

use serde::{Deserialize, Serialize};

use crate::codec::truncate_text;
use crate::model::dictionary::{MAX_NAME_BYTES, MAX_NAME_CHARS};

/// One named integer-to-label table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enumeration {
    name: String,
    entries: Vec<(i32, String)>,
}

impl Enumeration {
    /// Create an empty table. The name shares the 32-character limit of
    /// variable names.
    pub fn new(name: &str) -> Self {
        Self {
            name: truncate_text(name, MAX_NAME_CHARS, MAX_NAME_BYTES).to_string(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an entry; a repeated key replaces the previous label.
    pub fn insert(&mut self, key: i32, label: impl Into<String>) {
        let label = label.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = label,
            None => self.entries.push((key, label)),
        }
    }

    pub fn get(&self, key: i32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, label)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in emission order.
    pub fn entries(&self) -> &[(i32, String)] {
        &self.entries
    }
}

/// All tables of a dataset, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enumerations {
    tables: Vec<Enumeration>,
}

impl Enumerations {
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Enumeration> {
        self.tables.iter().find(|table| table.name() == name)
    }

    /// Get or create the named table.
    pub fn get_or_create(&mut self, name: &str) -> &mut Enumeration {
        let position = self.tables.iter().position(|table| table.name() == name);
        let index = match position {
            Some(index) => index,
            None => {
                self.tables.push(Enumeration::new(name));
                self.tables.len() - 1
            }
        };
        &mut self.tables[index]
    }

    /// Define (or extend) a table from key/label pairs.
    pub fn define(&mut self, name: &str, entries: &[(i32, &str)]) {
        let table = self.get_or_create(name);
        for (key, label) in entries {
            table.insert(*key, *label);
        }
    }

    /// Tables in creation order.
    pub fn tables(&self) -> &[Enumeration] {
        &self.tables
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
