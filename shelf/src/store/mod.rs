use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use shelf_api::SearchResult;
use thiserror::Error;

pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store write failed: {0}")]
    Write(String),
}

/// Sink for decoded results. `upsert` must be idempotent by `SearchResult::id`.
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn upsert(&self, result: &SearchResult) -> Result<(), StoreError>;
}

/// In-process sink keyed by result id.
#[derive(Default)]
pub struct MemoryStore {
    books: Mutex<HashMap<String, SearchResult>>,
    writes: Mutex<HashMap<String, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.books.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<SearchResult> {
        self.books
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// How many times `upsert` has been called for `id`.
    pub fn upsert_count(&self, id: &str) -> usize {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn upsert(&self, result: &SearchResult) -> Result<(), StoreError> {
        self.books
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(result.id.clone(), result.clone());
        *self
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(result.id.clone())
            .or_insert(0) += 1;
        Ok(())
    }
}
