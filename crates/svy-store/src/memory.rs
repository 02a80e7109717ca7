//! In-memory document store.
//!
//! Collections are `BTreeMap`s keyed by document id, so `find` iteration is
//! naturally in ascending `_id` order. Suitable for tests and for embedding
//! callers that do not need durable persistence.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::{Document, DocumentStore, document_id, matches_filter};

/// BTreeMap-backed document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, BTreeMap<i64, Document>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection (0 if it does not exist).
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, BTreeMap::len)
    }

    /// Whether the collection is absent or empty.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn insert_doc(docs: &mut BTreeMap<i64, Document>, collection: &str, doc: Document) -> Result<()> {
        if !doc.is_object() {
            return Err(StoreError::invalid_document("document must be an object"));
        }
        let id = document_id(&doc)
            .ok_or_else(|| StoreError::invalid_document("document must carry an integer _id"))?;
        if docs.contains_key(&id) {
            return Err(StoreError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }
        docs.insert(id, doc);
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn drop_collection(&mut self, collection: &str) -> Result<()> {
        if self.collections.remove(collection).is_some() {
            debug!(collection, "dropped collection");
        }
        Ok(())
    }

    fn insert_one(&mut self, collection: &str, doc: Document) -> Result<()> {
        let docs = self.collections.entry(collection.to_string()).or_default();
        Self::insert_doc(docs, collection, doc)
    }

    fn insert_many(&mut self, collection: &str, docs: Vec<Document>) -> Result<()> {
        let target = self.collections.entry(collection.to_string()).or_default();
        for doc in docs {
            Self::insert_doc(target, collection, doc)?;
        }
        Ok(())
    }

    fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Document>> {
        let Some(docs) = self.collections.get(collection) else {
            return Ok(None);
        };
        Ok(docs
            .values()
            .find(|doc| matches_filter(doc, filter))
            .cloned())
    }

    fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Document>> {
        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .values()
            .filter(|doc| matches_filter(doc, filter))
            .cloned()
            .collect())
    }

    fn update_one(&mut self, collection: &str, filter: &Value, patch: &Value) -> Result<bool> {
        let Some(docs) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(fields) = patch.as_object() else {
            return Err(StoreError::invalid_document("patch must be an object"));
        };
        for doc in docs.values_mut() {
            if matches_filter(doc, filter) {
                let target = doc
                    .as_object_mut()
                    .ok_or_else(|| StoreError::invalid_document("stored document is not an object"))?;
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
                return Ok(true);
            }
        }
        Ok(false)
    }
}
