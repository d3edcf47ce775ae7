//! Cache-first repository discovery
//!
//! [`Discoverer`] answers from the on-disk snapshot when it can. A stale
//! snapshot is still returned at once while a single background thread
//! rescans and replaces it. Only a missing or mismatched snapshot makes the
//! caller wait for a scan.

use crate::adapters::GitMetadataAdapter;
use crate::cache::{CacheStore, DiscoveryCache};
use crate::config::DiscoveryConfig;
use crate::paths::{normalize_key, resolve_search_paths};
use crate::scan::{ScanSignal, Scanner, StopReason};
use crossbeam_channel::{SendTimeoutError, Sender};
use parking_lot::RwLock;
use repodisco_core::ports::{Clock, RepoMetadataPort, SystemClock};
use repodisco_core::{CancelToken, DiscoveredRepo, DiscoveryError, DiscoveryResult, Result, ScanStats};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const REFRESH_POLL: Duration = Duration::from_millis(10);

/// How long a streaming send waits before rechecking whether the scan stopped
const SEND_POLL: Duration = Duration::from_millis(20);

/// Request for repository discovery
#[derive(Clone, Debug, Default)]
pub struct DiscoverReq {
    /// Empty means the configured extra paths plus the default project folders
    pub paths: Vec<PathBuf>,
    pub cancel: Option<CancelToken>,
}

impl DiscoverReq {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, cancel: None }
    }

    /// Scan the default search locations
    pub fn defaults() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Repository discovery engine
///
/// Cheap to clone; clones share the cache, the configured-workspace set and
/// the background refresh state.
#[derive(Clone)]
pub struct Discoverer {
    inner: Arc<Inner>,
}

struct Inner {
    config: DiscoveryConfig,
    scanner: Scanner,
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    configured: RwLock<HashSet<String>>,
    refreshing: AtomicBool,
    scans: AtomicUsize,
}

impl Discoverer {
    /// Engine backed by libgit2 metadata and the system clock
    pub fn new(config: DiscoveryConfig) -> Self {
        Self::with_ports(config, Arc::new(GitMetadataAdapter::new()), Arc::new(SystemClock))
    }

    pub fn with_ports(
        config: DiscoveryConfig,
        metadata: Arc<dyn RepoMetadataPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = config.normalized();
        let scanner = Scanner::new(config.scan_options(), metadata);
        let cache = CacheStore::new(config.cache_path(), Arc::clone(&clock));
        Self {
            inner: Arc::new(Inner {
                config,
                scanner,
                cache,
                clock,
                configured: RwLock::new(HashSet::new()),
                refreshing: AtomicBool::new(false),
                scans: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.inner.config
    }

    /// Whether a background refresh is running right now
    pub fn refresh_in_progress(&self) -> bool {
        self.inner.refreshing.load(Ordering::SeqCst)
    }

    /// Block until no background refresh is running, up to `timeout`.
    ///
    /// Returns `false` if a refresh was still running when the timeout passed.
    pub fn wait_for_refresh(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.refresh_in_progress() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(REFRESH_POLL);
        }
        true
    }

    /// Number of filesystem scans this engine has started, including background ones
    pub fn scan_count(&self) -> usize {
        self.inner.scans.load(Ordering::SeqCst)
    }

    /// Replace the set of registered workspace paths.
    ///
    /// Paths mapped to `false` are ignored. Each path is matched both as
    /// given and, when it exists, with symlinks resolved.
    pub fn set_configured_paths(&self, paths: &HashMap<PathBuf, bool>) {
        let mut keys = HashSet::new();
        for (path, _) in paths.iter().filter(|(_, enabled)| **enabled) {
            keys.insert(normalize_key(path));
            if let Ok(canonical) = path.canonicalize() {
                keys.insert(normalize_key(&canonical));
            }
        }
        debug!(count = keys.len(), "Updated configured workspace paths");
        *self.inner.configured.write() = keys;
    }

    /// Cache-aware discovery.
    ///
    /// Fresh snapshot: returned as is. Stale snapshot: returned at once and
    /// a background refresh is started unless one is running. No usable
    /// snapshot: scan now, persist even a partial result, and return it.
    pub fn discover(&self, req: DiscoverReq) -> Result<DiscoveryResult> {
        let started = Instant::now();
        let search_paths = self.resolve(&req.paths);

        if let Some(cache) = self.load_matching_cache(&search_paths) {
            let age = cache.age(self.inner.clock.now());
            if age < self.inner.config.cache_ttl {
                debug!(age_ms = age.as_millis() as u64, "Serving fresh discovery cache");
                let refreshing = self.refresh_in_progress();
                return Ok(self.cached_result(cache, search_paths, age, refreshing, started));
            }

            info!(age_ms = age.as_millis() as u64, "Discovery cache is stale, refreshing in background");
            let refreshing = self.spawn_refresh(search_paths.clone());
            return Ok(self.cached_result(cache, search_paths, age, refreshing, started));
        }

        debug!("No usable discovery cache, scanning");
        self.scan_and_persist(search_paths, req.cancel.as_ref(), started)
    }

    /// Scan now regardless of the cache, and persist the result
    pub fn discover_fresh(&self, req: DiscoverReq) -> Result<DiscoveryResult> {
        let started = Instant::now();
        let search_paths = self.resolve(&req.paths);
        self.scan_and_persist(search_paths, req.cancel.as_ref(), started)
    }

    /// Scan now, sending each repository to `sender` as soon as it is found.
    ///
    /// The channel is closed when this returns, whether the scan finished,
    /// hit its deadline or was cancelled. A consumer that stops reading
    /// does not hold the scan past its deadline: pending sends are dropped
    /// once the pool stops. The collected result is persisted like a fresh
    /// scan.
    pub fn discover_streaming(&self, req: DiscoverReq, sender: Sender<DiscoveredRepo>) -> Result<ScanStats> {
        let started = Instant::now();
        let search_paths = self.resolve(&req.paths);
        let configured = self.inner.configured.read().clone();

        let sink = |repo: &DiscoveredRepo, signal: &ScanSignal| {
            let mut pending = repo.clone();
            pending.is_configured = configured.contains(&normalize_key(&pending.path));
            loop {
                match sender.send_timeout(pending, SEND_POLL) {
                    Ok(()) => return,
                    // Nobody is listening any more
                    Err(SendTimeoutError::Disconnected(_)) => return,
                    Err(SendTimeoutError::Timeout(repo)) => {
                        if signal.is_stopped() {
                            debug!(repo = %repo, "Scan stopped, dropping undelivered repository");
                            return;
                        }
                        pending = repo;
                    }
                }
            }
        };

        self.inner.scans.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .inner
            .scanner
            .scan_with_sink(&search_paths, req.cancel.as_ref(), &sink);
        drop(sender);

        if outcome.stop == StopReason::Cancelled {
            return Err(DiscoveryError::Cancelled);
        }
        self.persist(&outcome.repositories, &search_paths);

        debug!(
            repos = outcome.repositories.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Streaming discovery finished"
        );
        Ok(outcome.stats)
    }

    /// Delete the on-disk snapshot
    pub fn invalidate_cache(&self) -> Result<()> {
        self.inner.cache.invalidate()
    }

    fn resolve(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        resolve_search_paths(paths, &self.inner.config.extra_paths)
    }

    fn load_matching_cache(&self, search_paths: &[PathBuf]) -> Option<DiscoveryCache> {
        let cache = self.inner.cache.load()?;
        if !cache.matches(search_paths) {
            debug!("Discovery cache was built from different search paths");
            return None;
        }
        Some(cache)
    }

    fn cached_result(
        &self,
        cache: DiscoveryCache,
        search_paths: Vec<PathBuf>,
        age: Duration,
        refreshing: bool,
        started: Instant,
    ) -> DiscoveryResult {
        DiscoveryResult::from_cache(
            self.overlay(cache.repositories),
            search_paths,
            age.as_millis() as u64,
            refreshing,
            started.elapsed().as_millis() as u64,
        )
    }

    fn scan_and_persist(
        &self,
        search_paths: Vec<PathBuf>,
        cancel: Option<&CancelToken>,
        started: Instant,
    ) -> Result<DiscoveryResult> {
        self.inner.scans.fetch_add(1, Ordering::SeqCst);
        let outcome = self.inner.scanner.scan(&search_paths, cancel);
        if outcome.stop == StopReason::Cancelled {
            return Err(DiscoveryError::Cancelled);
        }

        // Partial results are cached too; a large tree would otherwise be
        // rescanned on every call
        self.persist(&outcome.repositories, &search_paths);

        let mut result = DiscoveryResult::from_scan(
            self.overlay(outcome.repositories),
            outcome.stats,
            search_paths,
            started.elapsed().as_millis() as u64,
        );
        result.refresh_in_progress = self.refresh_in_progress();
        Ok(result)
    }

    fn persist(&self, repositories: &[DiscoveredRepo], search_paths: &[PathBuf]) {
        if let Err(e) = self.inner.cache.save(repositories, search_paths) {
            warn!(error = %e, "Failed to write discovery cache");
        }
    }

    /// Start a detached refresh unless one is already running.
    ///
    /// Returns whether a refresh is running once this returns.
    fn spawn_refresh(&self, search_paths: Vec<PathBuf>) -> bool {
        if self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Background refresh already running");
            return true;
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("repodisco-refresh".to_string())
            .spawn(move || {
                let _reset = RefreshFlag(&inner.refreshing);
                let started = Instant::now();
                inner.scans.fetch_add(1, Ordering::SeqCst);

                let outcome = inner.scanner.scan(&search_paths, None);
                if let Err(e) = inner.cache.save(&outcome.repositories, &search_paths) {
                    warn!(error = %e, "Failed to write refreshed discovery cache");
                }
                info!(
                    repos = outcome.repositories.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Background discovery refresh finished"
                );
            });

        match spawned {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Failed to start background refresh");
                self.inner.refreshing.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    fn overlay(&self, mut repositories: Vec<DiscoveredRepo>) -> Vec<DiscoveredRepo> {
        let configured = self.inner.configured.read();
        for repo in &mut repositories {
            repo.is_configured = configured.contains(&normalize_key(&repo.path));
        }
        repositories
    }
}

/// Clears the refreshing flag when the refresh thread ends, panics included
struct RefreshFlag<'a>(&'a AtomicBool);

impl Drop for RefreshFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
