use std::path::PathBuf;
use thiserror::Error;

/// Errors that can reach a caller of the discovery engine
///
/// Filesystem and cache failures are absorbed inside the engine, so in
/// practice only `Cancelled` escapes a discovery call. `Io` comes from
/// explicit cache operations such as invalidation.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Discovery cancelled by caller")]
    Cancelled,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DiscoveryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mentions_path() {
        let err = DiscoveryError::io(
            "/tmp/cache.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/cache.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(
            DiscoveryError::Cancelled.to_string(),
            "Discovery cancelled by caller"
        );
    }
}
