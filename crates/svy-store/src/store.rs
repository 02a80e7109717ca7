//! The document store contract.
//!
//! A store holds named collections of JSON documents. Every document is a
//! JSON object carrying an integer `_id` field; filters and patches are
//! JSON objects as well. Consumers (the `.dta` codec in particular) treat
//! this trait as their only persistence seam, so alternative backends can
//! be dropped in without touching the codec.

use serde_json::Value;

use crate::error::Result;

/// Field name of the document identifier.
pub const ID_FIELD: &str = "_id";

/// A JSON document. Always an object with an integer [`ID_FIELD`].
pub type Document = Value;

/// A collection-scoped document store.
///
/// Filters are JSON objects matched by field equality: a document matches
/// when every filter field is present in the document with an equal value.
/// An empty filter matches every document. Patches are JSON objects whose
/// fields are merged into the matched document, overwriting on conflict.
pub trait DocumentStore {
    /// Drop the collection, discarding all documents. Dropping a collection
    /// that does not exist is not an error. The collection is recreated
    /// empty on the next insert.
    fn drop_collection(&mut self, collection: &str) -> Result<()>;

    /// Insert a single document.
    fn insert_one(&mut self, collection: &str, doc: Document) -> Result<()>;

    /// Insert a batch of documents in order.
    fn insert_many(&mut self, collection: &str, docs: Vec<Document>) -> Result<()>;

    /// Find the first document matching `filter`, in ascending `_id` order.
    fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Document>>;

    /// Find all documents matching `filter`, in ascending `_id` order.
    fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Document>>;

    /// Merge `patch` into the first document matching `filter`.
    ///
    /// Returns `true` when a document was matched and updated.
    fn update_one(&mut self, collection: &str, filter: &Value, patch: &Value) -> Result<bool>;
}

/// Extract the integer `_id` of a document, if present.
pub fn document_id(doc: &Document) -> Option<i64> {
    doc.get(ID_FIELD).and_then(Value::as_i64)
}

/// Check whether `doc` matches `filter` by field equality.
pub fn matches_filter(doc: &Document, filter: &Value) -> bool {
    match filter.as_object() {
        Some(fields) => fields
            .iter()
            .all(|(key, expected)| doc.get(key) == Some(expected)),
        // A non-object filter matches nothing.
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_filter_equality() {
        let doc = json!({"_id": 3, "name": "hh", "round": 2});
        assert!(matches_filter(&doc, &json!({})));
        assert!(matches_filter(&doc, &json!({"_id": 3})));
        assert!(matches_filter(&doc, &json!({"name": "hh", "round": 2})));
        assert!(!matches_filter(&doc, &json!({"round": 3})));
        assert!(!matches_filter(&doc, &json!({"missing": null})));
    }

    #[test]
    fn test_document_id() {
        assert_eq!(document_id(&json!({"_id": 7})), Some(7));
        assert_eq!(document_id(&json!({"id": 7})), None);
        assert_eq!(document_id(&json!({"_id": "7"})), None);
    }
}
