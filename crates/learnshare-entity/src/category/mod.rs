//! Category hierarchy entities.

pub mod closure;
pub mod integrity;
pub mod model;
pub mod outcome;
pub mod slug;
pub mod status;
pub mod view;

pub use closure::ClosureEdge;
pub use integrity::{IntegrityReport, IntegrityViolation};
pub use model::{Category, CategoryPatch, CreateCategory, ListScope};
pub use outcome::{DeleteOutcome, MoveOutcome, PurgeOutcome};
pub use slug::{is_valid_slug, slugify};
pub use status::CategoryStatus;
pub use view::{CategoryCrumb, CategoryDto, CategoryTreeNode};
