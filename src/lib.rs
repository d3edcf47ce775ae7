//! repodisco - find Git repositories on the local filesystem
//!
//! The engine walks search roots with a bounded worker pool, remembers the
//! result in a TTL cache, and serves stale data while refreshing in the
//! background. See [`Discoverer`] for the entry point.

pub mod adapters;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod paths;
pub mod scan;

pub use config::{AppConfig, DiscoveryConfig};
pub use discovery::{DiscoverReq, Discoverer};
pub use repodisco_core::{CancelToken, DiscoveredRepo, DiscoveryError, DiscoveryResult, ScanStats};
