//! Parallel repository scanner
//!
//! A fixed set of worker threads reads directories from a shared
//! [`JobQueue`] and pushes subdirectories back onto it. The calling thread
//! acts as the monitor: it polls for quiescence, the deadline and caller
//! cancellation, then closes the queue and lets the thread scope join the
//! workers.

use crate::classify::{classify, within_depth, EntryKind, FsKind};
use crate::paths::normalize_key;
use crate::scan::queue::{JobGuard, JobQueue, ScanJob, QUEUE_CAPACITY};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use repodisco_core::ports::RepoMetadataPort;
use repodisco_core::{CancelToken, DiscoveredRepo, ScanStats};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, trace, warn};

/// How long an idle worker waits on the queue before rechecking for close
const WORKER_POLL: Duration = Duration::from_millis(20);

/// Delay before the monitor's first quiescence check
const MONITOR_WARMUP: Duration = Duration::from_millis(5);

const MONITOR_INTERVAL: Duration = Duration::from_millis(5);

/// Callback invoked once per newly discovered repository, from worker threads.
///
/// A sink that may block must poll [`ScanSignal::is_stopped`] and give up
/// once it is set, or the pool cannot be joined at the deadline.
pub type RepoSink<'a> = &'a (dyn Fn(&DiscoveredRepo, &ScanSignal) + Sync);

/// Shutdown state of one scan, handed to sinks
#[derive(Debug, Default)]
pub struct ScanSignal {
    stopped: AtomicBool,
}

impl ScanSignal {
    /// True once the pool went idle, hit its deadline or was cancelled
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// 0 = unlimited
    pub max_depth: usize,
    pub workers: usize,
    pub timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: 4,
            workers: num_cpus::get(),
            timeout: Duration::from_secs(10),
            queue_capacity: QUEUE_CAPACITY,
        }
    }
}

/// Why the pool stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Queue drained and no worker busy
    Idle,
    DeadlineExceeded,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Sorted by path
    pub repositories: Vec<DiscoveredRepo>,
    pub stats: ScanStats,
    pub stop: StopReason,
}

pub struct Scanner {
    options: ScanOptions,
    metadata: Arc<dyn RepoMetadataPort>,
}

impl Scanner {
    pub fn new(options: ScanOptions, metadata: Arc<dyn RepoMetadataPort>) -> Self {
        Self { options, metadata }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan `roots` and collect every repository found.
    ///
    /// Never fails: unreadable directories contribute nothing, and a deadline
    /// or cancellation returns whatever was found so far.
    pub fn scan(&self, roots: &[PathBuf], cancel: Option<&CancelToken>) -> ScanOutcome {
        self.run(roots, cancel, None)
    }

    /// Like [`Scanner::scan`], additionally handing each repository to
    /// `sink` as soon as it is found.
    pub fn scan_with_sink(
        &self,
        roots: &[PathBuf],
        cancel: Option<&CancelToken>,
        sink: RepoSink<'_>,
    ) -> ScanOutcome {
        self.run(roots, cancel, Some(sink))
    }

    fn run(
        &self,
        roots: &[PathBuf],
        cancel: Option<&CancelToken>,
        sink: Option<RepoSink<'_>>,
    ) -> ScanOutcome {
        let started = Instant::now();
        let deadline = started + self.options.timeout;
        let workers = self.options.workers.max(1);

        info!(
            roots = roots.len(),
            workers,
            max_depth = self.options.max_depth,
            "Starting repository scan"
        );

        let state = ScanState {
            queue: JobQueue::new(self.options.queue_capacity),
            results: Mutex::new(Vec::new()),
            seen: Mutex::new(HashSet::new()),
            scanned: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            max_depth: self.options.max_depth,
            metadata: self.metadata.as_ref(),
            sink,
            signal: ScanSignal::default(),
        };

        for root in roots {
            if !state.queue.try_push(ScanJob::root(root.clone())) {
                state.skip();
            }
        }

        let stop = thread::scope(|scope| {
            let mut spawned = 0;
            for id in 0..workers {
                let state = &state;
                let handle = thread::Builder::new()
                    .name(format!("repodisco-scan-{}", id))
                    .spawn_scoped(scope, move || worker_loop(id, state));
                match handle {
                    Ok(_) => spawned += 1,
                    Err(e) => warn!(worker = id, error = %e, "Failed to spawn scan worker"),
                }
            }

            let stop = if spawned == 0 {
                // Nobody will drain the queue; treat it as an immediate deadline
                StopReason::DeadlineExceeded
            } else {
                wait_for_stop(&state.queue, deadline, cancel)
            };
            state.queue.close();
            state.signal.stop();
            stop
        });

        let mut repositories = state.results.into_inner();
        repositories.sort_by(|a, b| a.path.cmp(&b.path));

        let stats = ScanStats {
            scanned_dirs: state.scanned.into_inner(),
            skipped_dirs: state.skipped.into_inner(),
            timed_out: stop == StopReason::DeadlineExceeded,
        };

        match stop {
            StopReason::Idle => info!(
                repos = repositories.len(),
                scanned = stats.scanned_dirs,
                skipped = stats.skipped_dirs,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Repository scan completed"
            ),
            StopReason::DeadlineExceeded => warn!(
                repos = repositories.len(),
                scanned = stats.scanned_dirs,
                timeout_ms = self.options.timeout.as_millis() as u64,
                "Repository scan hit its deadline, keeping partial results"
            ),
            StopReason::Cancelled => info!(
                repos = repositories.len(),
                "Repository scan cancelled by caller"
            ),
        }

        ScanOutcome {
            repositories,
            stats,
            stop,
        }
    }
}

/// Poll until the pool is idle, the deadline passes, or the caller cancels
fn wait_for_stop(queue: &JobQueue, deadline: Instant, cancel: Option<&CancelToken>) -> StopReason {
    thread::sleep(MONITOR_WARMUP.min(deadline.saturating_duration_since(Instant::now())));
    loop {
        if queue.is_quiescent() {
            return StopReason::Idle;
        }
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return StopReason::Cancelled;
        }
        let now = Instant::now();
        if now >= deadline {
            return StopReason::DeadlineExceeded;
        }
        thread::sleep(MONITOR_INTERVAL.min(deadline - now));
    }
}

struct ScanState<'a> {
    queue: JobQueue,
    results: Mutex<Vec<DiscoveredRepo>>,
    seen: Mutex<HashSet<String>>,
    scanned: AtomicU64,
    skipped: AtomicU64,
    max_depth: usize,
    metadata: &'a dyn RepoMetadataPort,
    sink: Option<RepoSink<'a>>,
    signal: ScanSignal,
}

fn worker_loop(id: usize, state: &ScanState<'_>) {
    trace!(worker = id, "Scan worker starting");
    while !state.queue.is_closed() {
        let Some(job) = state.queue.pop(WORKER_POLL) else {
            continue;
        };
        let _guard = JobGuard::new(&state.queue);
        state.process(job);
    }
    trace!(worker = id, "Scan worker exiting");
}

impl ScanState<'_> {
    fn skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn process(&self, job: ScanJob) {
        if !within_depth(job.depth, self.max_depth) {
            self.skip();
            return;
        }

        let entries = match fs::read_dir(&job.path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %job.path.display(), error = %e, "Skipping unreadable directory");
                return;
            }
        };
        self.scanned.fetch_add(1, Ordering::Relaxed);

        for entry in entries.flatten() {
            if self.queue.is_closed() {
                return;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let name = entry.file_name();
            let kind = classify(&name.to_string_lossy(), FsKind::from(file_type));
            match kind {
                EntryKind::Sentinel => self.record(&job.path),
                EntryKind::Descend => {
                    let child = job.child(entry.path());
                    if !within_depth(child.depth, self.max_depth) {
                        self.skip();
                    } else if !self.queue.try_push(child) {
                        trace!(path = %entry.path().display(), "Queue full, dropping directory");
                        self.skip();
                    }
                }
                other if other.counts_as_skipped() => self.skip(),
                _ => {}
            }
        }
    }

    fn record(&self, repo_root: &Path) {
        if !self.seen.lock().insert(normalize_key(repo_root)) {
            return;
        }

        let remote_url = self.metadata.remote_url(repo_root).unwrap_or_else(|e| {
            trace!(path = %repo_root.display(), error = %e, "No remote URL");
            String::new()
        });
        let repo = DiscoveredRepo::new(repo_root.to_path_buf(), remote_url, modified_at(repo_root));
        debug!(repo = %repo, "Discovered repository");

        if let Some(sink) = self.sink {
            sink(&repo, &self.signal);
        }
        self.results.lock().push(repo);
    }
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .into()
}
