//! # learnshare-database
//!
//! Storage for the category hierarchy: the category table, its closure
//! index and the document-assignment collaborator, backed either by
//! PostgreSQL or by a process-local snapshot.

pub mod connection;
pub mod error;
pub mod hierarchy;
pub mod integrity;
pub mod memory;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use hierarchy::{HierarchyBackend, HierarchyStores};
