//! PostgreSQL repositories for category rows, closure rows and document
//! assignments.

pub mod assignment;
pub mod category;
pub mod closure;

pub use assignment::DocumentCategoryRepository;
pub use category::CategoryRepository;
pub use closure::ClosureRepository;
