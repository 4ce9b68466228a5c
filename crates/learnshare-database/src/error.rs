//! Mapping of PostgreSQL failures onto [`AppError`] kinds.

use learnshare_core::error::{AppError, ErrorKind};

/// Partial unique index enforcing slug uniqueness among live categories.
pub const LIVE_SLUG_CONSTRAINT: &str = "categories_live_slug_key";

/// SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Translate a sqlx error raised while doing `context`.
///
/// Slug collisions become validation errors and lock timeouts become
/// retryable conflicts; everything else is a database error.
pub fn map_sqlx(context: &str, err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.constraint() == Some(LIVE_SLUG_CONSTRAINT) {
            return AppError::validation("Slug is already used by another category");
        }
        if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            return AppError::conflict(format!(
                "{context}: timed out waiting for the category hierarchy lock"
            ));
        }
    }
    AppError::with_source(ErrorKind::Database, format!("{context}: {err}"), err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_stay_database_kind() {
        let err = map_sqlx("Failed to load category", sqlx::Error::RowNotFound);
        assert_eq!(err.kind, ErrorKind::Database);
        assert!(err.message.starts_with("Failed to load category"));
    }
}
