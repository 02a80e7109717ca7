//! Stata `.dta` (version 118) dataset reader and writer.
//!
//! This crate reads and writes the self-describing 118 container:
//! header, offset map, variable dictionary, characteristics and notes,
//! the row-oriented data matrix with out-of-line long strings, and
//! value-label tables. Parsed observations are persisted through a
//! [`DocumentStore`] — one JSON document per row — and re-streamed from
//! the store when a file is written.
//!
//! # Features
//!
//! - Both byte orders (`MSF`/`LSF`), branch decided per field
//! - Type-specific missing-value sentinels, round-tripped as absence
//! - Long-string (`strL`) table with content-hash deduplication
//! - Notes and free-form characteristics
//! - Two-pass writing: the offset map is backpatched once section
//!   positions are known, so any `Write + Seek` sink works
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use svy_dta::{DtaFile, VarType};
//! use svy_store::MemoryStore;
//!
//! let mut file = DtaFile::new(MemoryStore::new(), "household");
//! file.read(Path::new("household.dta")).unwrap();
//! println!(
//!     "{} variables, {} observations",
//!     file.variable_count(),
//!     file.observation_count()
//! );
//!
//! let id = file.variable_id("hhsize").unwrap();
//! assert_eq!(file.var_type(id), VarType::Int);
//! ```

mod codec;
mod error;
mod gso;
mod model;
mod reader;
mod sink;
mod token;
mod types;
mod writer;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::json;

use svy_store::{DocumentStore, ID_FIELD};

pub use codec::ByteOrder;
pub use error::{DtaError, Result};
pub use model::{
    Characteristic, Characteristics, DatasetModel, Dictionary, Enumeration, Enumerations, Header,
    MapSection, OffsetMap, VariableId, DATASET_SCOPE,
};
pub use types::{Value, VarType, Variable};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A `.dta` dataset bound to one document-store collection.
///
/// The instance owns the in-memory section model (header, map,
/// dictionary, enumerations, characteristics); observations live in the
/// store, one document per row, ids 1..=N. Document id 0 holds the
/// serialized model bundle. The codec assumes exclusive ownership of the
/// collection for the duration of a [`read`](Self::read) or
/// [`write`](Self::write).
pub struct DtaFile<S> {
    store: S,
    collection: String,
    model: DatasetModel,
}

impl<S: DocumentStore> DtaFile<S> {
    /// Bind a store collection. The model starts at idle defaults.
    pub fn new(store: S, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            model: DatasetModel::default(),
        }
    }

    /// Parse a file into the model and stream its observations into the
    /// store. The collection is dropped and recreated first; a failed
    /// read leaves neither model nor collection in a usable state, so
    /// treat any error as "reconstruct the instance".
    pub fn read(&mut self, path: &Path) -> Result<()> {
        check_extension(path)?;
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DtaError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                DtaError::Io(e)
            }
        })?;

        self.model.reset();
        self.store.drop_collection(&self.collection)?;

        let mut reader = BufReader::new(file);
        reader::read_file(&mut reader, &mut self.model, &mut self.store, &self.collection)?;
        self.persist_model()
    }

    /// Write the model and the collection's observations to a file.
    pub fn write(&mut self, path: &Path) -> Result<()> {
        check_extension(path)?;
        let file = File::create(path)?;
        writer::write_file(file, &mut self.model, &self.store, &self.collection)?;
        self.persist_model()
    }

    /// The document store this instance persists through.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The full section model, for direct inspection.
    pub fn model(&self) -> &DatasetModel {
        &self.model
    }

    // Header accessors.

    /// Format release, always "118".
    pub fn release(&self) -> &str {
        self.model.header.release()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.model.header.byte_order()
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.model.header.set_byte_order(order);
    }

    pub fn variable_count(&self) -> usize {
        self.model.header.variable_count()
    }

    /// Set the variable count, resetting the dictionary to placeholder
    /// entries. Counts above 65535 are a range error.
    pub fn set_variable_count(&mut self, count: usize) -> Result<()> {
        self.model.set_variable_count(count)
    }

    pub fn observation_count(&self) -> u64 {
        self.model.header.observation_count()
    }

    pub fn set_observation_count(&mut self, count: u64) {
        self.model.header.set_observation_count(count);
    }

    pub fn dataset_label(&self) -> &str {
        self.model.header.label()
    }

    /// Set the dataset label, truncated to 80 characters.
    pub fn set_dataset_label(&mut self, label: &str) {
        self.model.header.set_label(label);
    }

    pub fn clear_dataset_label(&mut self) {
        self.model.header.clear_label();
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.model.header.timestamp()
    }

    pub fn set_timestamp(&mut self, timestamp: &str) {
        self.model.header.set_timestamp(Some(timestamp.to_string()));
    }

    /// Stamp the header with the current local time.
    pub fn stamp_now(&mut self) {
        self.model
            .header
            .set_timestamp(Some(codec::current_timestamp()));
    }

    pub fn clear_timestamp(&mut self) {
        self.model.header.set_timestamp(None);
    }

    // Variable addressing and dictionary accessors.

    /// Resolve a variable name to its canonical handle.
    pub fn variable_id(&self, name: &str) -> Result<VariableId> {
        self.model.dictionary.id_of(name)
    }

    /// Resolve a 0-based index to its canonical handle.
    pub fn variable_at(&self, index: usize) -> Result<VariableId> {
        self.model.dictionary.id_at(index)
    }

    pub fn var_type(&self, id: VariableId) -> VarType {
        self.model.dictionary.var_type(id)
    }

    pub fn set_var_type(&mut self, id: VariableId, var_type: VarType) {
        self.model.dictionary.set_var_type(id, var_type);
    }

    pub fn set_all_types(&mut self, types: Vec<VarType>) -> Result<()> {
        self.model.dictionary.set_all_types(types)
    }

    pub fn variable_name(&self, id: VariableId) -> &str {
        self.model.dictionary.name(id)
    }

    /// Set a variable name, truncated to 32 characters.
    pub fn set_variable_name(&mut self, id: VariableId, name: &str) {
        self.model.dictionary.set_name(id, name);
    }

    pub fn set_all_variable_names(&mut self, names: Vec<String>) -> Result<()> {
        self.model.dictionary.set_all_names(names)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.model.dictionary.names()
    }

    pub fn format(&self, id: VariableId) -> Option<&str> {
        self.model.dictionary.format(id)
    }

    pub fn set_format(&mut self, id: VariableId, format: &str) {
        self.model.dictionary.set_format(id, format);
    }

    pub fn clear_format(&mut self, id: VariableId) {
        self.model.dictionary.clear_format(id);
    }

    pub fn set_all_formats(&mut self, formats: Vec<String>) -> Result<()> {
        self.model.dictionary.set_all_formats(formats)
    }

    pub fn variable_label(&self, id: VariableId) -> Option<&str> {
        self.model.dictionary.label(id)
    }

    pub fn set_variable_label(&mut self, id: VariableId, label: &str) {
        self.model.dictionary.set_label(id, label);
    }

    pub fn clear_variable_label(&mut self, id: VariableId) {
        self.model.dictionary.clear_label(id);
    }

    pub fn set_all_variable_labels(&mut self, labels: Vec<String>) -> Result<()> {
        self.model.dictionary.set_all_labels(labels)
    }

    pub fn sort_rank(&self, id: VariableId) -> Option<usize> {
        self.model.dictionary.sort_rank(id)
    }

    pub fn set_sort_rank(&mut self, id: VariableId, rank: usize) -> Result<()> {
        self.model.dictionary.set_sort_rank(id, rank)
    }

    pub fn clear_sort_rank(&mut self, id: VariableId) {
        self.model.dictionary.clear_sort_rank(id);
    }

    pub fn set_all_sort_ranks(&mut self, ranks: Vec<Option<usize>>) -> Result<()> {
        self.model.dictionary.set_all_sort_ranks(ranks)
    }

    pub fn var_types(&self) -> Vec<VarType> {
        self.model.dictionary.types()
    }

    // Enumerations (value-label tables).

    /// Define (or extend) a named value-label table.
    pub fn define_enumeration(&mut self, name: &str, entries: &[(i32, &str)]) {
        self.model.enumerations.define(name, entries);
    }

    pub fn enumeration(&self, name: &str) -> Option<&Enumeration> {
        self.model.enumerations.get(name)
    }

    /// Attach a defined table to a variable; undefined names are a
    /// range error.
    pub fn set_value_label(&mut self, id: VariableId, name: &str) -> Result<()> {
        self.model.set_value_label(id, name)
    }

    pub fn value_label(&self, id: VariableId) -> Option<&str> {
        self.model.dictionary.value_label(id)
    }

    pub fn clear_value_label(&mut self, id: VariableId) {
        self.model.dictionary.clear_value_label(id);
    }

    pub fn set_all_value_labels(&mut self, names: Vec<Option<String>>) -> Result<()> {
        self.model.set_all_value_labels(names)
    }

    // Characteristics and notes.

    /// Attach a free-form characteristic to a variable or, with
    /// [`DATASET_SCOPE`], to the dataset.
    pub fn set_characteristic(&mut self, scope: &str, name: &str, payload: &str) {
        self.model.characteristics.append(scope, name, payload);
    }

    pub fn characteristic(&self, scope: &str, name: &str) -> Option<&str> {
        self.model.characteristics.get(scope, name)
    }

    /// Add a note to a variable, or to the dataset when `scope` is None.
    pub fn add_note(&mut self, text: &str, scope: Option<&str>) {
        self.model
            .characteristics
            .add_note(scope.unwrap_or(DATASET_SCOPE), text);
    }

    pub fn notes(&self, scope: Option<&str>) -> Vec<&str> {
        self.model
            .characteristics
            .notes(scope.unwrap_or(DATASET_SCOPE))
    }

    // Observations.

    /// Append one observation, assigning it the next row id and bumping
    /// the observation count. Values are JSON fields keyed by variable
    /// name; absent fields mean missing.
    pub fn push_row(&mut self, values: serde_json::Value) -> Result<u64> {
        let row = self.observation_count() + 1;
        let mut doc = serde_json::Map::new();
        doc.insert(ID_FIELD.to_string(), json!(row));
        if let serde_json::Value::Object(fields) = values {
            for (key, value) in fields {
                doc.insert(key, value);
            }
        }
        self.store
            .insert_one(&self.collection, serde_json::Value::Object(doc))?;
        self.model.header.set_observation_count(row);
        Ok(row)
    }

    /// The dictionary, for read-only walks over all entries.
    pub fn dictionary(&self) -> &Dictionary {
        &self.model.dictionary
    }

    fn persist_model(&mut self) -> Result<()> {
        let bundle = json!({ ID_FIELD: 0, "model": serde_json::to_value(&self.model)? });
        let filter = json!({ ID_FIELD: 0 });
        if !self
            .store
            .update_one(&self.collection, &filter, &bundle)?
        {
            self.store.insert_one(&self.collection, bundle)?;
        }
        Ok(())
    }
}

/// Reject paths that do not end in `.dta`.
fn check_extension(path: &Path) -> Result<()> {
    let ok = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("dta"));
    if !ok {
        return Err(DtaError::WrongExtension {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use svy_store::MemoryStore;

    #[test]
    fn test_check_extension() {
        assert!(check_extension(Path::new("a/b/survey.dta")).is_ok());
        assert!(check_extension(Path::new("survey.DTA")).is_ok());
        assert!(check_extension(Path::new("survey.csv")).is_err());
        assert!(check_extension(Path::new("survey")).is_err());
    }

    #[test]
    fn test_idle_defaults() {
        let file = DtaFile::new(MemoryStore::new(), "obs");
        assert_eq!(file.release(), "118");
        assert_eq!(file.byte_order(), ByteOrder::Lsf);
        assert_eq!(file.variable_count(), 0);
        assert_eq!(file.observation_count(), 0);
        assert_eq!(file.dataset_label(), "");
        assert_eq!(file.timestamp(), None);
    }

    #[test]
    fn test_push_row_assigns_ids() {
        let mut file = DtaFile::new(MemoryStore::new(), "obs");
        file.set_variable_count(1).unwrap();
        let id = file.variable_at(0).unwrap();
        file.set_variable_name(id, "age");
        file.set_var_type(id, VarType::Int);

        assert_eq!(file.push_row(json!({"age": 30})).unwrap(), 1);
        assert_eq!(file.push_row(json!({"age": 41})).unwrap(), 2);
        assert_eq!(file.observation_count(), 2);
        assert_eq!(file.store().len("obs"), 2);
    }
}
