pub mod pool;
pub mod queue;

pub use pool::{RepoSink, ScanOptions, ScanOutcome, ScanSignal, Scanner, StopReason};
pub use queue::{JobGuard, JobQueue, ScanJob, QUEUE_CAPACITY};
