pub mod repo;
pub mod result;

// Re-exports for convenience
pub use repo::*;
pub use result::*;
