use std::sync::Arc;

use async_trait::async_trait;
use shelf_api::SearchResult;
use shelf_db::Db;

use super::{BookStore, StoreError};

/// Postgres-backed sink. Connects lazily on the first write.
pub struct PgBookStore {
    db: Arc<Db>,
}

impl PgBookStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    // Re-seen books keep their first_seen_at; everything else is overwritten.
    async fn upsert(&self, result: &SearchResult) -> Result<(), StoreError> {
        let pool = self
            .db
            .pool()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        sqlx::query(
            "INSERT INTO books (id, isbn, title, authors, cover_url, relevance_score, match_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id)
             DO UPDATE SET
               isbn = COALESCE(EXCLUDED.isbn, books.isbn),
               title = EXCLUDED.title,
               authors = EXCLUDED.authors,
               cover_url = COALESCE(EXCLUDED.cover_url, books.cover_url),
               relevance_score = EXCLUDED.relevance_score,
               match_type = EXCLUDED.match_type,
               updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&result.id)
        .bind(result.isbn.as_deref())
        .bind(&result.title)
        .bind(&result.authors)
        .bind(result.cover_url.as_deref())
        .bind(result.relevance_score)
        .bind(&result.match_type)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}
