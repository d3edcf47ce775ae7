//! On-disk snapshot of the last discovery result
//!
//! The file is JSON and written via temp-file-then-rename, so readers never
//! see a torn write. Anything unreadable is a cache miss, never an error.

use crate::paths::normalize_key;
use chrono::{DateTime, Utc};
use repodisco_core::ports::Clock;
use repodisco_core::{DiscoveredRepo, DiscoveryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Bump whenever the payload shape changes; older files are then ignored
pub const CACHE_VERSION: u32 = 1;

pub const CACHE_FILE_NAME: &str = "discovery-cache.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCache {
    pub repositories: Vec<DiscoveredRepo>,
    pub search_paths: Vec<PathBuf>,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
}

impl DiscoveryCache {
    /// Time since the snapshot was written; zero if the clock went backwards
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether this snapshot was produced from exactly `search_paths`, in any order
    pub fn matches(&self, search_paths: &[PathBuf]) -> bool {
        path_set(&self.search_paths) == path_set(search_paths)
    }
}

fn path_set(paths: &[PathBuf]) -> HashSet<String> {
    paths.iter().map(|p| normalize_key(p)).collect()
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

pub struct CacheStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. Missing, unreadable, unparseable or
    /// other-version files all yield `None`.
    pub fn load(&self) -> Option<DiscoveryCache> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No usable discovery cache");
                return None;
            }
        };

        // Check the version before the full parse so a reshaped payload is
        // reported as a version mismatch rather than corruption
        match serde_json::from_str::<VersionProbe>(&contents) {
            Ok(probe) if probe.version == CACHE_VERSION => {}
            Ok(probe) => {
                debug!(found = probe.version, expected = CACHE_VERSION, "Ignoring discovery cache from another version");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discovery cache is corrupt, ignoring it");
                return None;
            }
        }

        match serde_json::from_str(&contents) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discovery cache is corrupt, ignoring it");
                None
            }
        }
    }

    /// Persist a snapshot stamped with the current version and time.
    ///
    /// The configured flag is an overlay computed per read, so it is cleared
    /// before writing.
    pub fn save(&self, repositories: &[DiscoveredRepo], search_paths: &[PathBuf]) -> Result<()> {
        let cache = DiscoveryCache {
            repositories: repositories
                .iter()
                .cloned()
                .map(|mut repo| {
                    repo.is_configured = false;
                    repo
                })
                .collect(),
            search_paths: search_paths.to_vec(),
            timestamp: self.clock.now(),
            version: CACHE_VERSION,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        create_private_dir(&dir)?;

        // Same directory as the target so the rename stays on one filesystem
        let tmp = NamedTempFile::new_in(&dir).map_err(|e| DiscoveryError::io(&dir, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, &cache)
                .map_err(|e| DiscoveryError::io(tmp.path(), e.into()))?;
            writer.flush().map_err(|e| DiscoveryError::io(tmp.path(), e))?;
        }
        restrict_file(tmp.path())?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| DiscoveryError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| DiscoveryError::io(&self.path, e.error))?;

        debug!(
            path = %self.path.display(),
            repos = cache.repositories.len(),
            "Wrote discovery cache"
        );
        Ok(())
    }

    /// Delete the snapshot. A missing file is not an error.
    pub fn invalidate(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Invalidated discovery cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DiscoveryError::io(&self.path, e)),
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|e| DiscoveryError::io(dir, e))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| DiscoveryError::io(dir, e))
}

#[cfg(unix)]
fn restrict_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| DiscoveryError::io(path, e))
}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use repodisco_core::ports::SystemClock;
    use tempfile::TempDir;

    fn repo(path: &str) -> DiscoveredRepo {
        DiscoveredRepo::new(PathBuf::from(path), String::new(), Utc::now())
    }

    fn store(dir: &TempDir) -> CacheStore {
        CacheStore::new(dir.path().join("nested/cache.json"), Arc::new(SystemClock))
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        let roots = vec![PathBuf::from("/code")];

        store.save(&[repo("/code/a"), repo("/code/b")], &roots)?;
        let cache = store.load().expect("cache written");

        assert_eq!(cache.version, CACHE_VERSION);
        assert_eq!(cache.repositories.len(), 2);
        assert_eq!(cache.search_paths, roots);
        assert!(cache.age(Utc::now()) < Duration::from_secs(60));
        Ok(())
    }

    #[test]
    fn test_configured_flag_not_persisted() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        let mut configured = repo("/code/a");
        configured.is_configured = true;

        store.save(&[configured], &[])?;
        let cache = store.load().expect("cache written");
        assert!(!cache.repositories[0].is_configured);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_a_miss() -> Result<()> {
        let temp_dir = TempDir::new()?;
        assert!(store(&temp_dir).load().is_none());
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_a_miss() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        store.save(&[repo("/code/a")], &[])?;

        let contents = fs::read_to_string(store.path())?;
        fs::write(store.path(), &contents[..contents.len() / 2])?;
        assert!(store.load().is_none());

        fs::write(store.path(), "not json at all")?;
        assert!(store.load().is_none());
        Ok(())
    }

    #[test]
    fn test_other_version_is_a_miss() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        store.save(&[repo("/code/a")], &[])?;

        let contents = fs::read_to_string(store.path())?;
        let bumped = contents.replace(
            &format!("\"version\":{}", CACHE_VERSION),
            &format!("\"version\":{}", CACHE_VERSION + 1),
        );
        assert_ne!(contents, bumped);
        fs::write(store.path(), bumped)?;
        assert!(store.load().is_none());
        Ok(())
    }

    #[test]
    fn test_invalidate_is_idempotent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        store.save(&[], &[])?;

        store.invalidate()?;
        assert!(!store.path().exists());
        store.invalidate()?;
        Ok(())
    }

    #[test]
    fn test_matches_ignores_order_and_case() {
        let cache = DiscoveryCache {
            repositories: vec![],
            search_paths: vec![PathBuf::from("/Users/me/Code"), PathBuf::from("/srv/repos")],
            timestamp: Utc::now(),
            version: CACHE_VERSION,
        };
        assert!(cache.matches(&[PathBuf::from("/srv/repos/"), PathBuf::from("/users/me/code")]));
        assert!(!cache.matches(&[PathBuf::from("/srv/repos")]));
        assert!(!cache.matches(&[
            PathBuf::from("/srv/repos"),
            PathBuf::from("/users/me/code"),
            PathBuf::from("/tmp"),
        ]));
    }

    #[test]
    fn test_age_never_negative() {
        let cache = DiscoveryCache {
            repositories: vec![],
            search_paths: vec![],
            timestamp: Utc::now() + chrono::Duration::hours(1),
            version: CACHE_VERSION,
        };
        assert_eq!(cache.age(Utc::now()), Duration::ZERO);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_and_dir_are_owner_only() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        store.save(&[repo("/code/a")], &[])?;

        let file_mode = fs::metadata(store.path())?.permissions().mode() & 0o777;
        let dir_mode = fs::metadata(temp_dir.path().join("nested"))?.permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
        Ok(())
    }
}
