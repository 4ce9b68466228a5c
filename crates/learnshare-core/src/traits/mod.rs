//! Core traits defined in `learnshare-core` and implemented by other crates.

pub mod assignment;

pub use assignment::AssignmentSource;
