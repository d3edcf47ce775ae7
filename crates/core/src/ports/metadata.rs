use anyhow::Result;
use std::path::Path;

/// Port for per-repository metadata lookups
///
/// Called from scanner worker threads once per newly discovered repository.
/// Implementations may be slow (they usually touch git), and failures are
/// treated as "no remote".
pub trait RepoMetadataPort: Send + Sync {
    /// Best-effort remote URL for the repository rooted at `repo_root`
    fn remote_url(&self, repo_root: &Path) -> Result<String>;
}

/// Metadata port that never reports a remote
#[derive(Debug, Default)]
pub struct NoMetadata;

impl RepoMetadataPort for NoMetadata {
    fn remote_url(&self, _repo_root: &Path) -> Result<String> {
        Ok(String::new())
    }
}
