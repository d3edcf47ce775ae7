use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller-side cancellation handle
///
/// Cloning shares the flag. Cancelling is distinct from the scan deadline:
/// a deadline yields a partial result, a cancel yields
/// `DiscoveryError::Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
