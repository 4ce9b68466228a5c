//! Category hierarchy service.

pub mod bulk;
pub mod cache;
pub mod request;
pub mod service;
pub mod tree;

pub use bulk::{BulkFailure, BulkReport};
pub use cache::{TreeCache, TreeKey};
pub use request::{CreateCategoryRequest, UpdateCategoryRequest};
pub use service::CategoryService;
pub use tree::TreeBuilder;
