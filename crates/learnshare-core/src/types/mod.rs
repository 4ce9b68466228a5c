//! Core type definitions used across the LearnShare workspace.

pub mod id;
pub mod policy;

pub use id::*;
pub use policy::DeletePolicy;
