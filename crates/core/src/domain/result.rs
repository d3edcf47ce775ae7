use super::repo::DiscoveredRepo;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Counters collected by one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Directories whose entries were read
    pub scanned_dirs: u64,
    /// Directories not read: noise, hidden, over the depth budget, or dropped on a full queue
    pub skipped_dirs: u64,
    /// The scan deadline expired before the pool went idle
    pub timed_out: bool,
}

/// Response envelope for a discovery call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub repositories: Vec<DiscoveredRepo>,
    pub count: usize,
    pub cached: bool,
    /// Age of the cached snapshot; `None` for fresh scans
    pub cache_age_ms: Option<u64>,
    pub refresh_in_progress: bool,
    pub elapsed_ms: u64,
    pub scanned_dirs: u64,
    pub skipped_dirs: u64,
    pub timed_out: bool,
    pub search_paths: Vec<PathBuf>,
}

impl DiscoveryResult {
    /// Result of a scan that ran during this call
    pub fn from_scan(
        repositories: Vec<DiscoveredRepo>,
        stats: ScanStats,
        search_paths: Vec<PathBuf>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            count: repositories.len(),
            repositories,
            cached: false,
            cache_age_ms: None,
            refresh_in_progress: false,
            elapsed_ms,
            scanned_dirs: stats.scanned_dirs,
            skipped_dirs: stats.skipped_dirs,
            timed_out: stats.timed_out,
            search_paths,
        }
    }

    /// Result served from the cache
    pub fn from_cache(
        repositories: Vec<DiscoveredRepo>,
        search_paths: Vec<PathBuf>,
        cache_age_ms: u64,
        refresh_in_progress: bool,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            count: repositories.len(),
            repositories,
            cached: true,
            cache_age_ms: Some(cache_age_ms),
            refresh_in_progress,
            elapsed_ms,
            search_paths,
            ..Self::default()
        }
    }
}
