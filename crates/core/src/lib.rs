//! repodisco core - domain types and ports with no filesystem dependencies
//!
//! This crate holds what the discovery engine produces (`DiscoveredRepo`,
//! `DiscoveryResult`), the interfaces it consumes (ports), and the error
//! type callers see. Scanning, caching and git access live in the
//! `repodisco` crate as adapters over these types.

pub mod cancel;
pub mod domain;
pub mod error;
pub mod ports;

// Re-exports for ergonomics
pub use cancel::CancelToken;
pub use domain::*;
pub use error::*;
