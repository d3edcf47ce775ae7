//! Bounded job queue with in-flight accounting
//!
//! A job counts as in flight from the moment it is pushed until the worker
//! that popped it drops its [`JobGuard`]. The pool is idle only when the
//! channel is empty *and* nothing is in flight: a worker that just popped
//! the last job may still be about to push its subdirectories.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Default number of pending directories the queue will hold
pub const QUEUE_CAPACITY: usize = 10_000;

/// A directory waiting to be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanJob {
    pub path: PathBuf,
    /// Distance from the search root (root = 0)
    pub depth: usize,
}

impl ScanJob {
    pub fn root(path: PathBuf) -> Self {
        Self { path, depth: 0 }
    }

    pub fn child(&self, path: PathBuf) -> Self {
        Self {
            path,
            depth: self.depth + 1,
        }
    }
}

pub struct JobQueue {
    sender: Sender<ScanJob>,
    receiver: Receiver<ScanJob>,
    capacity: usize,
    in_flight: AtomicUsize,
    closed: AtomicBool,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            in_flight: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Push without blocking.
    ///
    /// Returns `false` when the queue is full or closed; the job is dropped.
    pub fn try_push(&self, job: ScanJob) -> bool {
        if self.is_closed() {
            return false;
        }
        // Count before sending so the job is never invisible to the monitor
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                false
            }
        }
    }

    /// Wait up to `timeout` for a job. `None` on timeout or once closed.
    pub fn pop(&self, timeout: Duration) -> Option<ScanJob> {
        if self.is_closed() {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => Some(job),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Mark a popped job as fully processed
    fn finish(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// No queued jobs and no worker mid-job
    pub fn is_quiescent(&self) -> bool {
        self.receiver.is_empty() && self.in_flight() == 0
    }

    /// Stop handing out jobs; workers exit on their next pop
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Marks the popped job finished when dropped, even if processing panics
pub struct JobGuard<'a> {
    queue: &'a JobQueue,
}

impl<'a> JobGuard<'a> {
    pub fn new(queue: &'a JobQueue) -> Self {
        Self { queue }
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.queue.finish();
    }
}
