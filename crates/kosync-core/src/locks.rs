//! Per-document exclusion tokens
//!
//! A push is a read-modify-write on the progress store (check the debounce
//! gate, send, record). Two overlapping pushes for the same document could
//! both pass the gate, so each document gets its own async mutex. Pushes for
//! different documents never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::identity::DocumentId;

/// Lazily created async mutex per document key
#[derive(Debug, Default)]
pub struct DocumentLocks {
    tokens: Mutex<HashMap<DocumentId, Arc<AsyncMutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a document
    ///
    /// The returned guard must be held for the whole push sequence.
    pub async fn acquire(&self, document: &DocumentId) -> OwnedMutexGuard<()> {
        let token = {
            let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(tokens.entry(document.clone()).or_default())
        };
        token.lock_owned().await
    }

    /// Number of documents that have ever been locked
    pub fn len(&self) -> usize {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
