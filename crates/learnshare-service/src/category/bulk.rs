//! Per-id results of bulk operations.

use serde::{Deserialize, Serialize};

use learnshare_core::AppError;
use learnshare_core::error::ErrorKind;
use learnshare_core::types::CategoryId;

/// One id a bulk operation could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    /// The category.
    pub id: CategoryId,
    /// Why it failed.
    pub kind: ErrorKind,
    /// Human-readable reason.
    pub message: String,
}

/// Outcome of a bulk restore. Each id commits on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    /// Ids processed successfully, in request order.
    pub succeeded: Vec<CategoryId>,
    /// Ids that failed, in request order.
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    pub(crate) fn record(&mut self, id: CategoryId, result: Result<(), AppError>) {
        match result {
            Ok(()) => self.succeeded.push(id),
            Err(err) => self.failed.push(BulkFailure {
                id,
                kind: err.kind,
                message: err.message,
            }),
        }
    }

    /// Whether every id succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
