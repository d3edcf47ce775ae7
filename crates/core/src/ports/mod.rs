pub mod metadata;
pub mod time;

// Re-exports
pub use metadata::*;
pub use time::*;
