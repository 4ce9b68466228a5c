//! # learnshare-service
//!
//! Use cases of the category hierarchy. [`CategoryService`] validates
//! requests, delegates every topology change to the storage backend as one
//! atomic operation and assembles tree, breadcrumb and listing views with
//! [`TreeBuilder`].
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod category;

pub use category::{
    BulkReport, CategoryService, CreateCategoryRequest, TreeBuilder, TreeCache,
    UpdateCategoryRequest,
};
