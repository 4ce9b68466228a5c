//! Category table repository.

use std::collections::BTreeSet;

use sqlx::{PgConnection, PgPool};

use learnshare_core::error::AppError;
use learnshare_core::result::AppResult;
use learnshare_core::types::CategoryId;
use learnshare_entity::category::{Category, CategoryPatch, CreateCategory, ListScope};

use crate::error::map_sqlx;

/// Repository for category rows.
///
/// Reads go through the pool; writes take the connection of the
/// surrounding hierarchy transaction.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    /// Create a new category repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a category by ID, live or soft-deleted.
    pub async fn find_by_id(&self, id: CategoryId) -> AppResult<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("Failed to find category", e))
    }

    /// Find the live category owning `slug`.
    pub async fn find_live_by_slug(&self, slug: &str) -> AppResult<Option<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE slug = $1 AND deleted_at IS NULL",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("Failed to find category by slug", e))
    }

    /// List categories in `scope`, ordered by id.
    pub async fn list(&self, scope: ListScope) -> AppResult<Vec<Category>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx("Failed to acquire connection", e))?;
        Self::list_in(&mut conn, scope).await
    }

    /// Categories in `scope` inside a transaction, ordered by id.
    pub async fn list_in(conn: &mut PgConnection, scope: ListScope) -> AppResult<Vec<Category>> {
        let sql = match scope {
            ListScope::Live => "SELECT * FROM categories WHERE deleted_at IS NULL ORDER BY id",
            ListScope::Deleted => {
                "SELECT * FROM categories WHERE deleted_at IS NOT NULL ORDER BY id"
            }
            ListScope::All => "SELECT * FROM categories ORDER BY id",
        };
        sqlx::query_as::<_, Category>(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx("Failed to list categories", e))
    }

    /// Live categories among `ids` inside a transaction.
    pub async fn find_live_by_ids_in(
        conn: &mut PgConnection,
        ids: &[CategoryId],
    ) -> AppResult<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE id = ANY($1) AND deleted_at IS NULL ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to load categories", e))
    }

    /// Find a category inside a transaction.
    pub async fn find_in(conn: &mut PgConnection, id: CategoryId) -> AppResult<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx("Failed to find category", e))
    }

    /// A live category inside a transaction, or a not-found error.
    pub async fn require_live_in(conn: &mut PgConnection, id: CategoryId) -> AppResult<Category> {
        Self::find_in(conn, id)
            .await?
            .filter(Category::is_live)
            .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))
    }

    /// Ids of every live category.
    pub async fn live_ids_in(conn: &mut PgConnection) -> AppResult<BTreeSet<CategoryId>> {
        let ids: Vec<CategoryId> =
            sqlx::query_scalar("SELECT id FROM categories WHERE deleted_at IS NULL")
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| map_sqlx("Failed to list live category ids", e))?;
        Ok(ids.into_iter().collect())
    }

    /// Insert a category row.
    pub async fn insert_in(conn: &mut PgConnection, data: &CreateCategory) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug, description, status, sort_order) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(data.status)
        .bind(data.sort_order)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to create category", e))
    }

    /// Apply a display-attribute patch to a live category.
    pub async fn update(&self, id: CategoryId, patch: &CategoryPatch) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET \
                name = COALESCE($2, name), \
                slug = COALESCE($3, slug), \
                description = CASE WHEN $4 THEN $5 ELSE description END, \
                status = COALESCE($6, status), \
                sort_order = COALESCE($7, sort_order), \
                updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.slug)
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .bind(patch.status)
        .bind(patch.sort_order)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("Failed to update category", e))?
        .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))
    }

    /// Mark categories as deleted.
    pub async fn soft_delete_in(conn: &mut PgConnection, ids: &[CategoryId]) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE categories SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to soft-delete categories", e))?;
        Ok(result.rows_affected())
    }

    /// Clear the deletion mark of a category.
    pub async fn restore_in(conn: &mut PgConnection, id: CategoryId) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET deleted_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NOT NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to restore category", e))?
        .ok_or_else(|| AppError::not_found(format!("Deleted category {id} not found")))
    }

    /// Permanently delete a category row.
    pub async fn purge_in(conn: &mut PgConnection, id: CategoryId) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "DELETE FROM categories WHERE id = $1 AND deleted_at IS NOT NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to purge category", e))?
        .ok_or_else(|| AppError::not_found(format!("Deleted category {id} not found")))
    }
}
