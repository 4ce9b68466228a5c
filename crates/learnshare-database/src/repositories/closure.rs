//! Category closure table repository.
//!
//! Maintenance statements work on whole subtrees at once: a move deletes
//! every row that links the subtree to the outside and re-inserts the cross
//! product of the new parent's ancestor rows with the subtree's own rows.

use sqlx::{PgConnection, PgPool};

use learnshare_core::result::AppResult;
use learnshare_core::types::CategoryId;
use learnshare_entity::category::ClosureEdge;

use crate::error::map_sqlx;
use crate::memory::EdgeDelta;

/// Repository for `category_closure` rows.
#[derive(Debug, Clone)]
pub struct ClosureRepository {
    pool: PgPool,
}

impl ClosureRepository {
    /// Create a new closure repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Live proper ancestors of `id`, nearest first, inside a transaction.
    pub async fn ancestors_of_in(
        conn: &mut PgConnection,
        id: CategoryId,
    ) -> AppResult<Vec<ClosureEdge>> {
        sqlx::query_as::<_, ClosureEdge>(
            "SELECT e.ancestor_id, e.descendant_id, e.level FROM category_closure e \
             JOIN categories a ON a.id = e.ancestor_id AND a.deleted_at IS NULL \
             JOIN categories d ON d.id = e.descendant_id AND d.deleted_at IS NULL \
             WHERE e.descendant_id = $1 AND e.level >= 1 \
             ORDER BY e.level ASC",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to load ancestors", e))
    }

    /// `id` and its live descendants, inside a transaction.
    pub async fn descendants_of_in(
        conn: &mut PgConnection,
        id: CategoryId,
    ) -> AppResult<Vec<ClosureEdge>> {
        sqlx::query_as::<_, ClosureEdge>(
            "SELECT e.ancestor_id, e.descendant_id, e.level FROM category_closure e \
             JOIN categories a ON a.id = e.ancestor_id AND a.deleted_at IS NULL \
             JOIN categories d ON d.id = e.descendant_id AND d.deleted_at IS NULL \
             WHERE e.ancestor_id = $1 \
             ORDER BY e.level ASC, e.descendant_id ASC",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to load descendants", e))
    }

    /// Every live parent-child row, inside a transaction.
    pub async fn parent_links_in(conn: &mut PgConnection) -> AppResult<Vec<ClosureEdge>> {
        sqlx::query_as::<_, ClosureEdge>(
            "SELECT e.ancestor_id, e.descendant_id, e.level FROM category_closure e \
             JOIN categories a ON a.id = e.ancestor_id AND a.deleted_at IS NULL \
             JOIN categories d ON d.id = e.descendant_id AND d.deleted_at IS NULL \
             WHERE e.level = 1 \
             ORDER BY e.ancestor_id, e.descendant_id",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to load parent links", e))
    }

    /// Live parent-child rows inside the subtree of `id`, inside a transaction.
    pub async fn subtree_links_in(
        conn: &mut PgConnection,
        id: CategoryId,
    ) -> AppResult<Vec<ClosureEdge>> {
        sqlx::query_as::<_, ClosureEdge>(
            "SELECT e.ancestor_id, e.descendant_id, e.level FROM category_closure e \
             JOIN category_closure s ON s.descendant_id = e.descendant_id \
                AND s.ancestor_id = $1 AND s.level >= 1 \
             JOIN categories a ON a.id = e.ancestor_id AND a.deleted_at IS NULL \
             JOIN categories d ON d.id = e.descendant_id AND d.deleted_at IS NULL \
             WHERE e.level = 1 \
             ORDER BY e.ancestor_id, e.descendant_id",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to load subtree links", e))
    }

    /// Whether `(ancestor, descendant)` is a row.
    pub async fn edge_exists(&self, ancestor: CategoryId, descendant: CategoryId) -> AppResult<bool> {
        Self::edge_exists_in(&mut *self.acquire().await?, ancestor, descendant).await
    }

    /// Every row, unfiltered.
    pub async fn all_rows(&self) -> AppResult<Vec<ClosureEdge>> {
        Self::all_rows_in(&mut *self.acquire().await?).await
    }

    async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx("Failed to acquire connection", e))
    }

    /// Whether `(ancestor, descendant)` is a row, inside a transaction.
    pub async fn edge_exists_in(
        conn: &mut PgConnection,
        ancestor: CategoryId,
        descendant: CategoryId,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM category_closure \
             WHERE ancestor_id = $1 AND descendant_id = $2)",
        )
        .bind(ancestor)
        .bind(descendant)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to check closure row", e))
    }

    /// Every row, inside a transaction.
    pub async fn all_rows_in(conn: &mut PgConnection) -> AppResult<Vec<ClosureEdge>> {
        sqlx::query_as::<_, ClosureEdge>(
            "SELECT ancestor_id, descendant_id, level FROM category_closure \
             ORDER BY ancestor_id, descendant_id",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to load closure rows", e))
    }

    /// Direct parent of `id`.
    pub async fn parent_of_in(
        conn: &mut PgConnection,
        id: CategoryId,
    ) -> AppResult<Option<CategoryId>> {
        sqlx::query_scalar::<_, CategoryId>(
            "SELECT ancestor_id FROM category_closure WHERE descendant_id = $1 AND level = 1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to load parent", e))
    }

    /// Direct children of `id`, by id.
    pub async fn child_ids_in(conn: &mut PgConnection, id: CategoryId) -> AppResult<Vec<CategoryId>> {
        sqlx::query_scalar::<_, CategoryId>(
            "SELECT descendant_id FROM category_closure WHERE ancestor_id = $1 AND level = 1 \
             ORDER BY descendant_id",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to load children", e))
    }

    /// `id` and its descendants, shallowest first.
    pub async fn descendant_ids_in(
        conn: &mut PgConnection,
        id: CategoryId,
    ) -> AppResult<Vec<CategoryId>> {
        sqlx::query_scalar::<_, CategoryId>(
            "SELECT descendant_id FROM category_closure WHERE ancestor_id = $1 \
             ORDER BY level, descendant_id",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to load descendant ids", e))
    }

    /// Index a new node: its self row plus one row per ancestor of the parent.
    pub async fn insert_under_parent_in(
        conn: &mut PgConnection,
        id: CategoryId,
        parent: Option<CategoryId>,
    ) -> AppResult<u64> {
        let mut inserted = sqlx::query(
            "INSERT INTO category_closure (ancestor_id, descendant_id, level) VALUES ($1, $1, 0)",
        )
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to insert self row", e))?
        .rows_affected();

        if let Some(parent) = parent {
            inserted += sqlx::query(
                "INSERT INTO category_closure (ancestor_id, descendant_id, level) \
                 SELECT ancestor_id, $1, level + 1 FROM category_closure WHERE descendant_id = $2",
            )
            .bind(id)
            .bind(parent)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx("Failed to inherit ancestor rows", e))?
            .rows_affected();
        }
        Ok(inserted)
    }

    /// Detach the subtree of `id` and attach it under `new_parent`.
    pub async fn move_subtree_in(
        conn: &mut PgConnection,
        id: CategoryId,
        new_parent: Option<CategoryId>,
    ) -> AppResult<EdgeDelta> {
        let removed = sqlx::query(
            "DELETE FROM category_closure \
             WHERE descendant_id IN (SELECT descendant_id FROM category_closure WHERE ancestor_id = $1) \
               AND ancestor_id NOT IN (SELECT descendant_id FROM category_closure WHERE ancestor_id = $1)",
        )
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to detach subtree", e))?
        .rows_affected();

        let inserted = match new_parent {
            None => 0,
            Some(parent) => sqlx::query(
                "INSERT INTO category_closure (ancestor_id, descendant_id, level) \
                 SELECT p.ancestor_id, c.descendant_id, p.level + c.level + 1 \
                 FROM category_closure p CROSS JOIN category_closure c \
                 WHERE p.descendant_id = $2 AND c.ancestor_id = $1",
            )
            .bind(id)
            .bind(parent)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx("Failed to attach subtree", e))?
            .rows_affected(),
        };

        Ok(EdgeDelta { removed, inserted })
    }

    /// Remove the self row and ancestor rows of a node.
    pub async fn detach_in(conn: &mut PgConnection, id: CategoryId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM category_closure WHERE descendant_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx("Failed to detach category", e))?;
        Ok(result.rows_affected())
    }

    /// Remove every row with a member of `ids` at either end.
    pub async fn remove_members_in(conn: &mut PgConnection, ids: &[CategoryId]) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM category_closure WHERE ancestor_id = ANY($1) OR descendant_id = ANY($1)",
        )
        .bind(ids)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx("Failed to remove subtree rows", e))?;
        Ok(result.rows_affected())
    }
}
