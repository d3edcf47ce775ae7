use std::fs::FileType;

/// Directory whose presence marks its parent as a repository root
pub const SENTINEL: &str = ".git";

/// Directory names never worth descending into, matched case-insensitively.
///
/// Package caches, build output, IDE state, OS-reserved folders, other VCS
/// metadata and language tool caches.
pub const NOISE_DIRS: &[&str] = &[
    // package managers
    "node_modules",
    "bower_components",
    "jspm_packages",
    "vendor",
    "Pods",
    "site-packages",
    ".npm",
    ".yarn",
    ".pnpm-store",
    ".cargo",
    ".rustup",
    ".gradle",
    ".m2",
    // build output
    "target",
    "build",
    "dist",
    "out",
    "obj",
    "DerivedData",
    "CMakeFiles",
    ".next",
    ".nuxt",
    ".terraform",
    // language caches
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    ".pytest_cache",
    ".mypy_cache",
    ".cache",
    // IDE metadata
    ".idea",
    ".vscode",
    ".vs",
    // other VCS
    ".svn",
    ".hg",
    ".bzr",
    "CVS",
    "_darcs",
    // OS reserved
    "Library",
    "Applications",
    "System",
    ".Trash",
    "AppData",
    "$RECYCLE.BIN",
    "System Volume Information",
    "lost+found",
];

/// What a directory entry is, without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Dir,
    Symlink,
    Other,
}

impl From<FileType> for FsKind {
    fn from(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            FsKind::Symlink
        } else if file_type.is_dir() {
            FsKind::Dir
        } else {
            FsKind::Other
        }
    }
}

/// Traversal decision for one directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `.git` directory: the parent is a repository, do not descend
    Sentinel,
    /// Never followed
    Symlink,
    /// On the noise list; skipped and counted
    Noise,
    /// Dot-directory other than the sentinel; skipped and counted
    Hidden,
    /// Queue at depth + 1
    Descend,
    /// Plain files and other non-directories
    Ignore,
}

impl EntryKind {
    /// Whether this entry counts toward the skipped-directory total
    pub fn counts_as_skipped(self) -> bool {
        matches!(self, EntryKind::Noise | EntryKind::Hidden)
    }
}

pub fn classify(name: &str, kind: FsKind) -> EntryKind {
    match kind {
        FsKind::Other => EntryKind::Ignore,
        FsKind::Symlink => EntryKind::Symlink,
        FsKind::Dir if name == SENTINEL => EntryKind::Sentinel,
        FsKind::Dir if is_noise(name) => EntryKind::Noise,
        FsKind::Dir if name.starts_with('.') => EntryKind::Hidden,
        FsKind::Dir => EntryKind::Descend,
    }
}

pub fn is_noise(name: &str) -> bool {
    NOISE_DIRS.iter().any(|noise| noise.eq_ignore_ascii_case(name))
}

/// A job at `depth` may be read when within `max_depth` (0 = unlimited)
pub fn within_depth(depth: usize, max_depth: usize) -> bool {
    max_depth == 0 || depth <= max_depth
}
