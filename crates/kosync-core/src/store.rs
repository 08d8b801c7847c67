//! Local progress cache
//!
//! The `ProgressStore` remembers the last successful push per document so
//! the debounce gate has something to compare against. It lives as long as
//! the engine that owns it and is never written to disk.
//!
//! ## Usage
//!
//! ```ignore
//! let store = ProgressStore::new();
//! store.record_push(&doc_id, 12, 300, now);
//! let last = store.get(&doc_id);
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::identity::DocumentId;
use crate::models::LocalProgressRecord;

/// In-memory map from document key to its last pushed position
#[derive(Debug, Default)]
pub struct ProgressStore {
    records: RwLock<HashMap<DocumentId, LocalProgressRecord>>,
}

impl ProgressStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record for a document (if one has been pushed)
    pub fn get(&self, document: &DocumentId) -> Option<LocalProgressRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document)
            .cloned()
    }

    /// Record an accepted push, replacing any previous record
    pub fn record_push(
        &self,
        document: &DocumentId,
        page: i64,
        total_pages: i64,
        pushed_at: i64,
    ) -> LocalProgressRecord {
        let record = LocalProgressRecord {
            document: document.clone(),
            page,
            total_pages,
            last_push: pushed_at,
        };

        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.clone(), record.clone());

        record
    }

    /// Number of documents with a record
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records, ordered by document key
    pub fn snapshot(&self) -> Vec<LocalProgressRecord> {
        let mut records: Vec<_> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.document.cmp(&b.document));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = ProgressStore::new();
        assert!(store.is_empty());
        assert!(store.get(&DocumentId::new("missing")).is_none());
    }

    #[test]
    fn test_record_push_overwrites() {
        let store = ProgressStore::new();
        let doc = DocumentId::new("doc-1");

        store.record_push(&doc, 10, 100, 1_000);
        store.record_push(&doc, 12, 100, 1_030);

        let record = store.get(&doc).unwrap();
        assert_eq!(record.page, 12);
        assert_eq!(record.last_push, 1_030);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_documents_are_independent() {
        let store = ProgressStore::new();
        store.record_push(&DocumentId::new("b"), 5, 50, 10);
        store.record_push(&DocumentId::new("a"), 7, 70, 20);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].document.as_str(), "a");
        assert_eq!(snapshot[1].page, 5);
    }
}
