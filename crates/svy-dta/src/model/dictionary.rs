//! The variable dictionary.
//!
//! One entry per declared variable, addressed by a [`VariableId`]
//! resolved once from either a 0-based index or a name. Name/format/label
//! setters truncate to their field widths; sort ranks are validated
//! against the variable count.

use serde::{Deserialize, Serialize};

use crate::codec::truncate_text;
use crate::error::{DtaError, Result};
use crate::types::{VarType, Variable};

/// On-disk width of a variable or value-label name field.
pub const NAME_FIELD_LEN: usize = 129;
/// On-disk width of a display format field.
pub const FORMAT_FIELD_LEN: usize = 57;
/// On-disk width of a variable label field.
pub const VAR_LABEL_FIELD_LEN: usize = 321;

/// Maximum variable name length in characters (129-byte field).
pub const MAX_NAME_CHARS: usize = 32;
/// Maximum variable name length in bytes.
pub const MAX_NAME_BYTES: usize = 128;
/// Maximum display format length in bytes (57-byte field).
pub const MAX_FORMAT_BYTES: usize = 56;
/// Maximum variable label length in bytes (321-byte field).
pub const MAX_VAR_LABEL_BYTES: usize = 320;

/// Canonical handle for one variable, resolved once and reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableId(usize);

impl VariableId {
    /// The 0-based position in the dictionary.
    pub fn index(self) -> usize {
        self.0
    }
}

/// The ordered set of dictionary entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    entries: Vec<Variable>,
}

impl Dictionary {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reset to `count` placeholder entries (type `byte`, empty name).
    pub fn reset(&mut self, count: usize) {
        self.entries = (0..count).map(|_| Variable::placeholder()).collect();
    }

    /// Resolve a 0-based index into a handle.
    pub fn id_at(&self, index: usize) -> Result<VariableId> {
        if index >= self.entries.len() {
            return Err(DtaError::VariableOutOfBounds {
                index,
                count: self.entries.len(),
            });
        }
        Ok(VariableId(index))
    }

    /// Resolve a variable name into a handle via a linear scan.
    pub fn id_of(&self, name: &str) -> Result<VariableId> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(VariableId)
            .ok_or_else(|| DtaError::unknown_variable(name))
    }

    pub fn get(&self, id: VariableId) -> &Variable {
        &self.entries[id.0]
    }

    pub fn entries(&self) -> &[Variable] {
        &self.entries
    }

    pub fn var_type(&self, id: VariableId) -> VarType {
        self.entries[id.0].var_type
    }

    pub fn set_var_type(&mut self, id: VariableId, var_type: VarType) {
        self.entries[id.0].var_type = var_type;
    }

    /// Replace every type at once. The list length must equal the
    /// variable count.
    pub fn set_all_types(&mut self, types: Vec<VarType>) -> Result<()> {
        self.check_bulk_len(types.len())?;
        for (entry, var_type) in self.entries.iter_mut().zip(types) {
            entry.var_type = var_type;
        }
        Ok(())
    }

    pub fn name(&self, id: VariableId) -> &str {
        &self.entries[id.0].name
    }

    /// Set a variable name, truncated to 32 characters.
    pub fn set_name(&mut self, id: VariableId, name: &str) {
        self.entries[id.0].name = truncate_text(name, MAX_NAME_CHARS, MAX_NAME_BYTES).to_string();
    }

    pub fn set_all_names(&mut self, names: Vec<String>) -> Result<()> {
        self.check_bulk_len(names.len())?;
        for (index, name) in names.into_iter().enumerate() {
            self.set_name(VariableId(index), &name);
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn format(&self, id: VariableId) -> Option<&str> {
        self.entries[id.0].format.as_deref()
    }

    /// Set a display format, truncated to 56 bytes.
    pub fn set_format(&mut self, id: VariableId, format: &str) {
        self.entries[id.0].format =
            Some(truncate_text(format, usize::MAX, MAX_FORMAT_BYTES).to_string());
    }

    pub fn clear_format(&mut self, id: VariableId) {
        self.entries[id.0].format = None;
    }

    pub fn set_all_formats(&mut self, formats: Vec<String>) -> Result<()> {
        self.check_bulk_len(formats.len())?;
        for (index, format) in formats.into_iter().enumerate() {
            self.set_format(VariableId(index), &format);
        }
        Ok(())
    }

    pub fn label(&self, id: VariableId) -> Option<&str> {
        self.entries[id.0].label.as_deref()
    }

    /// Set a variable label, truncated to 320 bytes.
    pub fn set_label(&mut self, id: VariableId, label: &str) {
        self.entries[id.0].label =
            Some(truncate_text(label, usize::MAX, MAX_VAR_LABEL_BYTES).to_string());
    }

    pub fn clear_label(&mut self, id: VariableId) {
        self.entries[id.0].label = None;
    }

    pub fn set_all_labels(&mut self, labels: Vec<String>) -> Result<()> {
        self.check_bulk_len(labels.len())?;
        for (index, label) in labels.into_iter().enumerate() {
            self.set_label(VariableId(index), &label);
        }
        Ok(())
    }

    pub fn sort_rank(&self, id: VariableId) -> Option<usize> {
        self.entries[id.0].sort_rank
    }

    /// Set a 0-based sort rank; ranks at or past the variable count are
    /// a range error.
    pub fn set_sort_rank(&mut self, id: VariableId, rank: usize) -> Result<()> {
        if rank >= self.entries.len() {
            return Err(DtaError::InvalidSortRank {
                rank,
                count: self.entries.len(),
            });
        }
        self.entries[id.0].sort_rank = Some(rank);
        Ok(())
    }

    pub fn clear_sort_rank(&mut self, id: VariableId) {
        self.entries[id.0].sort_rank = None;
    }

    /// Replace every sort rank at once; `None` clears a variable's rank.
    pub fn set_all_sort_ranks(&mut self, ranks: Vec<Option<usize>>) -> Result<()> {
        self.check_bulk_len(ranks.len())?;
        for rank in ranks.iter().flatten() {
            if *rank >= self.entries.len() {
                return Err(DtaError::InvalidSortRank {
                    rank: *rank,
                    count: self.entries.len(),
                });
            }
        }
        for (entry, rank) in self.entries.iter_mut().zip(ranks) {
            entry.sort_rank = rank;
        }
        Ok(())
    }

    /// Bulk-read counterparts of the set-all operations.
    pub fn types(&self) -> Vec<VarType> {
        self.entries.iter().map(|entry| entry.var_type).collect()
    }

    pub fn formats(&self) -> Vec<Option<&str>> {
        self.entries.iter().map(|entry| entry.format.as_deref()).collect()
    }

    pub fn labels(&self) -> Vec<Option<&str>> {
        self.entries.iter().map(|entry| entry.label.as_deref()).collect()
    }

    pub fn sort_ranks(&self) -> Vec<Option<usize>> {
        self.entries.iter().map(|entry| entry.sort_rank).collect()
    }

    pub fn value_labels(&self) -> Vec<Option<&str>> {
        self.entries
            .iter()
            .map(|entry| entry.value_label.as_deref())
            .collect()
    }

    pub fn value_label(&self, id: VariableId) -> Option<&str> {
        self.entries[id.0].value_label.as_deref()
    }

    /// Attach a value-label table name. Existence of the table is checked
    /// one level up, where the enumerations live.
    pub(crate) fn set_value_label_unchecked(&mut self, id: VariableId, name: &str) {
        self.entries[id.0].value_label =
            Some(truncate_text(name, MAX_NAME_CHARS, MAX_NAME_BYTES).to_string());
    }

    pub fn clear_value_label(&mut self, id: VariableId) {
        self.entries[id.0].value_label = None;
    }

    fn check_bulk_len(&self, provided: usize) -> Result<()> {
        if provided != self.entries.len() {
            return Err(DtaError::VariableOutOfBounds {
                index: provided,
                count: self.entries.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(count: usize) -> Dictionary {
        let mut dictionary = Dictionary::default();
        dictionary.reset(count);
        dictionary
    }

    #[test]
    fn test_id_resolution() {
        let mut dictionary = dict(3);
        dictionary.set_name(dictionary.id_at(1).unwrap(), "age");

        let id = dictionary.id_of("age").unwrap();
        assert_eq!(id.index(), 1);
        assert!(dictionary.id_of("weight").is_err());
        assert!(dictionary.id_at(3).is_err());
    }

    #[test]
    fn test_name_truncation() {
        let mut dictionary = dict(1);
        let id = dictionary.id_at(0).unwrap();
        let long: String = "n".repeat(40);
        dictionary.set_name(id, &long);
        assert_eq!(dictionary.name(id).len(), 32);
        assert_eq!(dictionary.name(id), &long[..32]);
    }

    #[test]
    fn test_sort_rank_bounds() {
        let mut dictionary = dict(2);
        let id = dictionary.id_at(0).unwrap();
        dictionary.set_sort_rank(id, 1).unwrap();
        assert_eq!(dictionary.sort_rank(id), Some(1));
        assert!(dictionary.set_sort_rank(id, 2).is_err());
        dictionary.clear_sort_rank(id);
        assert_eq!(dictionary.sort_rank(id), None);
    }

    #[test]
    fn test_bulk_set_length_checked() {
        let mut dictionary = dict(2);
        assert!(
            dictionary
                .set_all_types(vec![VarType::Int, VarType::Double])
                .is_ok()
        );
        assert!(dictionary.set_all_types(vec![VarType::Int]).is_err());
    }

    #[test]
    fn test_format_and_label_truncation() {
        let mut dictionary = dict(1);
        let id = dictionary.id_at(0).unwrap();

        dictionary.set_format(id, &"f".repeat(60));
        assert_eq!(dictionary.format(id).unwrap().len(), MAX_FORMAT_BYTES);

        dictionary.set_label(id, &"l".repeat(400));
        assert_eq!(dictionary.label(id).unwrap().len(), MAX_VAR_LABEL_BYTES);

        dictionary.clear_label(id);
        assert_eq!(dictionary.label(id), None);
    }
}
