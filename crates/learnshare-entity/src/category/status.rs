//! Category visibility status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a live category is offered to readers and uploaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "category_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    /// Shown in listings and pickers.
    #[default]
    Active,
    /// Kept in the hierarchy but hidden from readers.
    Inactive,
}

impl CategoryStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// The other status.
    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive => Self::Active,
        }
    }
}

impl fmt::Display for CategoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CategoryStatus {
    type Err = learnshare_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(learnshare_core::AppError::validation(format!(
                "Invalid category status: '{s}'. Expected one of: active, inactive"
            ))),
        }
    }
}
