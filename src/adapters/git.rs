use anyhow::{Context, Result};
use git2::Repository as GitRepository;
use repodisco_core::ports::RepoMetadataPort;
use std::path::Path;

/// Reads repository metadata with libgit2
pub struct GitMetadataAdapter;

impl GitMetadataAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GitMetadataAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RepoMetadataPort for GitMetadataAdapter {
    /// URL of `origin`, else of the first configured remote, else empty
    fn remote_url(&self, repo_root: &Path) -> Result<String> {
        let git_repo = GitRepository::open(repo_root)
            .with_context(|| format!("Failed to open git repository at {}", repo_root.display()))?;

        let remote = match git_repo.find_remote("origin") {
            Ok(remote) => remote,
            Err(_) => {
                let names = git_repo.remotes().context("Failed to list remotes")?;
                let Some(first) = names.iter().flatten().next() else {
                    return Ok(String::new());
                };
                git_repo
                    .find_remote(first)
                    .with_context(|| format!("Failed to read remote {}", first))?
            }
        };

        Ok(remote.url().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_origin_url() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let git_repo = GitRepository::init(temp_dir.path())?;
        git_repo.remote("upstream", "https://example.com/upstream.git")?;
        git_repo.remote("origin", "git@example.com:me/fork.git")?;

        let url = GitMetadataAdapter::new().remote_url(temp_dir.path())?;
        assert_eq!(url, "git@example.com:me/fork.git");
        Ok(())
    }

    #[test]
    fn test_falls_back_to_first_remote() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let git_repo = GitRepository::init(temp_dir.path())?;
        git_repo.remote("upstream", "https://example.com/upstream.git")?;

        let url = GitMetadataAdapter::new().remote_url(temp_dir.path())?;
        assert_eq!(url, "https://example.com/upstream.git");
        Ok(())
    }

    #[test]
    fn test_no_remotes_is_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        GitRepository::init(temp_dir.path())?;

        assert_eq!(GitMetadataAdapter::new().remote_url(temp_dir.path())?, "");
        Ok(())
    }

    #[test]
    fn test_fake_repo_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::create_dir(temp_dir.path().join(".git"))?;

        assert!(GitMetadataAdapter::new().remote_url(temp_dir.path()).is_err());
        Ok(())
    }
}
