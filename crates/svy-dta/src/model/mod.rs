//! The in-memory dataset model.
//!
//! Everything a file declares besides the observations themselves:
//! header, offset map, dictionary, value-label tables, characteristics.
//! One [`DatasetModel`] is owned by the codec instance; the read and
//! write routines receive its sections by reference. The whole model is
//! serializable and persists as document 0 in the store collection.

pub mod chars;
pub mod dictionary;
pub mod enums;
pub mod header;
pub mod map;

use serde::{Deserialize, Serialize};

pub use chars::{Characteristic, Characteristics, DATASET_SCOPE};
pub use dictionary::{Dictionary, VariableId};
pub use enums::{Enumeration, Enumerations};
pub use header::Header;
pub use map::{MapSection, OffsetMap};

use crate::error::{DtaError, Result};

/// The full section model of one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetModel {
    pub header: Header,
    pub map: OffsetMap,
    pub dictionary: Dictionary,
    pub enumerations: Enumerations,
    pub characteristics: Characteristics,
}

impl DatasetModel {
    /// Back to idle defaults, as at construction.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Set the variable count, resizing the dictionary to match.
    pub fn set_variable_count(&mut self, count: usize) -> Result<()> {
        self.header.set_variable_count(count)?;
        self.dictionary.reset(count);
        Ok(())
    }

    /// Attach a value-label table to a variable. The table must already
    /// be defined.
    pub fn set_value_label(&mut self, id: VariableId, name: &str) -> Result<()> {
        if !self.enumerations.contains(name) {
            return Err(DtaError::unknown_enumeration(name));
        }
        self.dictionary.set_value_label_unchecked(id, name);
        Ok(())
    }

    /// Replace every value-label reference at once; `None` clears one.
    /// Each named table must already be defined.
    pub fn set_all_value_labels(&mut self, names: Vec<Option<String>>) -> Result<()> {
        if names.len() != self.dictionary.len() {
            return Err(DtaError::VariableOutOfBounds {
                index: names.len(),
                count: self.dictionary.len(),
            });
        }
        for name in names.iter().flatten() {
            if !self.enumerations.contains(name) {
                return Err(DtaError::unknown_enumeration(name));
            }
        }
        for (index, name) in names.into_iter().enumerate() {
            let id = self.dictionary.id_at(index)?;
            match name {
                Some(name) => self.dictionary.set_value_label_unchecked(id, &name),
                None => self.dictionary.clear_value_label(id),
            }
        }
        Ok(())
    }
}
