//! Document-category assignment repository.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use learnshare_core::result::AppResult;
use learnshare_core::traits::AssignmentSource;
use learnshare_core::types::{CategoryId, DocumentId};

use crate::error::map_sqlx;

/// Assignments stored in `document_categories`.
///
/// Counting reads go through the pool. Attach, detach and the
/// delete-policy count run on the hierarchy transaction's connection.
#[derive(Debug, Clone)]
pub struct DocumentCategoryRepository {
    pool: PgPool,
}

impl DocumentCategoryRepository {
    /// Create a new assignment repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Documents attached to any of `categories`, inside a transaction.
    pub async fn count_in(conn: &mut PgConnection, categories: &[CategoryId]) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM document_categories WHERE category_id = ANY($1)",
        )
        .bind(categories)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to count documents", e))?;
        Ok(count as u64)
    }

    /// Attach `document` to `category`. Returns `false` if already attached.
    pub async fn assign_in(
        conn: &mut PgConnection,
        document: DocumentId,
        category: CategoryId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO document_categories (document_id, category_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(document)
        .bind(category)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to assign document", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Detach `document` from `category`. Returns `false` if not attached.
    pub async fn unassign_in(
        conn: &mut PgConnection,
        document: DocumentId,
        category: CategoryId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM document_categories WHERE document_id = $1 AND category_id = $2",
        )
        .bind(document)
        .bind(category)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to unassign document", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AssignmentSource for DocumentCategoryRepository {
    async fn count_direct_assignments(&self, category: CategoryId) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM document_categories WHERE category_id = $1")
                .bind(category)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx("Failed to count documents", e))?;
        Ok(count as u64)
    }

    async fn count_subtree_assignments(&self, subtree: &[CategoryId]) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT document_id) FROM document_categories \
             WHERE category_id = ANY($1)",
        )
        .bind(subtree)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx("Failed to count subtree documents", e))?;
        Ok(count as u64)
    }
}
