use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A Git working copy found on disk
///
/// `path` is the directory holding `.git`, not the `.git` directory itself.
/// `name` is always the directory basename; the remote URL is kept
/// separately so two clones of the same remote stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredRepo {
    pub path: PathBuf,
    pub name: String,
    #[serde(default)]
    pub remote_url: String,
    pub last_modified: DateTime<Utc>,
    /// Derived from the caller's workspace set on every read
    #[serde(default)]
    pub is_configured: bool,
}

impl DiscoveredRepo {
    pub fn new(path: PathBuf, remote_url: String, last_modified: DateTime<Utc>) -> Self {
        let name = repo_name(&path);
        Self {
            path,
            name,
            remote_url,
            last_modified,
            is_configured: false,
        }
    }
}

impl std::fmt::Display for DiscoveredRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

fn repo_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_basename() {
        let repo = DiscoveredRepo::new(
            PathBuf::from("/home/me/Projects/api"),
            "git@github.com:acme/api.git".to_string(),
            Utc::now(),
        );
        assert_eq!(repo.name, "api");
        assert!(!repo.is_configured);
    }

    #[test]
    fn test_name_falls_back_to_path_for_root() {
        let repo = DiscoveredRepo::new(PathBuf::from("/"), String::new(), Utc::now());
        assert_eq!(repo.name, "/");
    }

    #[test]
    fn test_display() {
        let repo = DiscoveredRepo::new(PathBuf::from("/path/to/repo"), String::new(), Utc::now());
        let display_str = format!("{}", repo);
        assert!(display_str.contains("repo"));
        assert!(display_str.contains("/path/to/repo"));
    }
}
