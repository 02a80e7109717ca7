//! Document store contract and in-memory implementation.
//!
//! This crate defines the persistence seam used by the survey dataset
//! tooling: a [`DocumentStore`] holds named collections of JSON documents
//! keyed by an integer `_id`, with insert/find/update/drop operations.
//! The `.dta` codec persists its parsed rows through this trait and never
//! talks to a concrete backend directly.
//!
//! [`MemoryStore`] is the bundled backend: a `BTreeMap`-based store meant
//! for tests and in-process pipelines.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use svy_store::{DocumentStore, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! store.insert_one("obs", json!({"_id": 1, "age": 35})).unwrap();
//! let doc = store.find_one("obs", &json!({"_id": 1})).unwrap().unwrap();
//! assert_eq!(doc["age"], json!(35));
//! ```

mod error;
mod memory;
mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::{Document, DocumentStore, ID_FIELD, document_id, matches_filter};
