//! # learnshare-entity
//!
//! Domain entity models for LearnShare categories. Every struct in this
//! crate is either a database row (deriving `sqlx::FromRow`) or a view
//! object handed to page controllers and the upload wizard.

pub mod category;
