use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// Folder names under the home directory that commonly hold checkouts.
///
/// "Documents" is left out on purpose: it is large and rarely holds repos.
pub const DEFAULT_PROJECT_DIRS: &[&str] = &[
    "Projects",
    "projects",
    "Code",
    "code",
    "Developer",
    "dev",
    "Repos",
    "repos",
    "src",
    "go/src",
    "workspace",
    "Workspace",
    "GitHub",
    "Desktop",
];

/// Resolve the directories to scan.
///
/// Explicit paths win when any are given. Otherwise `extra` (user configured
/// roots, in order) is followed by [`DEFAULT_PROJECT_DIRS`] under the home
/// directory. Candidates that do not exist or are not directories are dropped.
pub fn resolve_search_paths(explicit: &[PathBuf], extra: &[PathBuf]) -> Vec<PathBuf> {
    resolve_search_paths_in(explicit, extra, dirs::home_dir().as_deref())
}

/// [`resolve_search_paths`] with an explicit home directory
pub fn resolve_search_paths_in(
    explicit: &[PathBuf],
    extra: &[PathBuf],
    home: Option<&Path>,
) -> Vec<PathBuf> {
    let candidates: Vec<PathBuf> = if explicit.is_empty() {
        let mut candidates: Vec<PathBuf> = extra.iter().map(|p| expand_tilde(p, home)).collect();
        if let Some(home) = home {
            candidates.extend(DEFAULT_PROJECT_DIRS.iter().map(|name| home.join(name)));
        }
        candidates
    } else {
        explicit.iter().map(|p| expand_tilde(p, home)).collect()
    };

    let mut seen = HashSet::new();
    let mut resolved = Vec::new();
    for candidate in candidates {
        let path = clean_path(&absolutize(&candidate));
        if !path.is_dir() {
            trace!(path = %path.display(), "Skipping missing search path");
            continue;
        }
        if !seen.insert(normalize_key(&path)) {
            trace!(path = %path.display(), "Skipping duplicate search path");
            continue;
        }
        resolved.push(path);
    }

    debug!(count = resolved.len(), "Resolved search paths");
    resolved
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Lexically clean a path: drop `.` components, fold `..`, and lose any
/// trailing separator. Symlinks are not resolved.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(cleaned.components().next_back(), Some(Component::Normal(_)))
                    && cleaned.pop();
                if !popped && !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Case-insensitive identity key for a path.
///
/// Shared by root dedup, the scanner's seen set, cache path matching and the
/// configured-workspace overlay. The main target filesystems are
/// case-insensitive by default.
pub fn normalize_key(path: &Path) -> String {
    clean_path(path).to_string_lossy().to_lowercase()
}
