//! # learnshare-core
//!
//! Core crate for LearnShare. Contains the unified error system,
//! configuration schemas, typed identifiers, the category delete policy,
//! and the collaborator traits the category hierarchy consumes.
//!
//! This crate has **no** internal dependencies on other LearnShare crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
