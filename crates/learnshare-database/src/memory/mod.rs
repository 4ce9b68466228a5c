//! Process-local storage: category rows, closure index and assignments.

pub mod assignment;
pub mod closure;
pub mod store;

pub use assignment::MemoryAssignments;
pub use closure::{ClosureIndex, EdgeDelta, Removal};
pub use store::CategoryStore;
