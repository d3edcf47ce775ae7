use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CACHE_FILE_NAME;
use crate::cli::CliArgs;
use crate::scan::ScanOptions;

pub const DEFAULT_MAX_DEPTH: usize = 4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Settings for one discovery engine instance
///
/// Zero values for `timeout`, `workers` and `cache_ttl` mean "use the
/// default" and are replaced by [`DiscoveryConfig::normalized`]. `max_depth`
/// is the exception: 0 means unlimited.
#[serde_as]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub max_depth: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "timeout_secs")]
    pub timeout: Duration,
    pub workers: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "cache_ttl_secs")]
    pub cache_ttl: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    /// Scanned before the built-in defaults; `~` is expanded
    pub extra_paths: Vec<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            timeout: DEFAULT_TIMEOUT,
            workers: 0,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_file: None,
            extra_paths: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Replace zero values with defaults and fill in the cache location
    pub fn normalized(mut self) -> Self {
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.workers == 0 {
            self.workers = num_cpus::get().max(1);
        }
        if self.cache_ttl.is_zero() {
            self.cache_ttl = DEFAULT_CACHE_TTL;
        }
        if self.cache_file.is_none() {
            self.cache_file = Some(default_cache_path());
        }
        self
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_file.clone().unwrap_or_else(default_cache_path)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_depth: self.max_depth,
            workers: self.workers.max(1),
            timeout: self.timeout,
            ..ScanOptions::default()
        }
    }
}

/// Contents of `repodisco.toml`
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AppConfig {
    pub version: u32,
    /// Workspaces already registered with the daemon; discovered repos at
    /// these paths are reported as configured
    #[serde(default)]
    pub workspaces: Vec<PathBuf>,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            workspaces: Vec::new(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "repodisco")
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs = project_dirs().context("Failed to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    Ok(config_dir.join("repodisco.toml"))
}

/// Per-user cache location, falling back to the temp dir when no home is known
pub fn default_cache_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.cache_dir().join(CACHE_FILE_NAME),
        None => std::env::temp_dir().join("repodisco").join(CACHE_FILE_NAME),
    }
}

impl AppConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => get_default_config_path()?,
        };

        if !path.exists() {
            let default_config = AppConfig::default();
            // Create directory if it doesn't exist
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            default_config.save(&path)?;
            return Ok(default_config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn from_cli_and_file(cli_args: &CliArgs) -> Result<Self> {
        let mut config = Self::load(cli_args.config.clone())?;

        // CLI args override config file
        let discovery = &mut config.discovery;
        if let Some(max_depth) = cli_args.max_depth {
            discovery.max_depth = max_depth;
        }
        if let Some(workers) = cli_args.workers {
            discovery.workers = workers;
        }
        if let Some(timeout) = cli_args.timeout {
            discovery.timeout = Duration::from_secs(timeout);
        }
        if let Some(ttl) = cli_args.ttl {
            discovery.cache_ttl = Duration::from_secs(ttl);
        }
        if let Some(cache_file) = &cli_args.cache_file {
            discovery.cache_file = Some(cache_file.clone());
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.discovery.max_depth, 4);
        assert_eq!(config.discovery.timeout, Duration::from_secs(10));
        assert_eq!(config.discovery.cache_ttl, Duration::from_secs(3600));
        assert!(config.workspaces.is_empty());
    }

    #[test]
    fn test_normalized_fills_zero_values() {
        let config = DiscoveryConfig {
            max_depth: 0,
            timeout: Duration::ZERO,
            workers: 0,
            cache_ttl: Duration::ZERO,
            cache_file: None,
            extra_paths: vec![],
        }
        .normalized();

        // 0 depth means unlimited and is kept
        assert_eq!(config.max_depth, 0);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.workers >= 1);
        assert_eq!(config.cache_ttl, DEFAULT_CACHE_TTL);
        assert!(config.cache_file.is_some());
    }

    #[test]
    fn test_normalized_keeps_explicit_values() {
        let config = DiscoveryConfig {
            timeout: Duration::from_millis(250),
            workers: 3,
            cache_ttl: Duration::from_millis(1),
            cache_file: Some(PathBuf::from("/tmp/c.json")),
            ..DiscoveryConfig::default()
        }
        .normalized();

        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.workers, 3);
        assert_eq!(config.cache_ttl, Duration::from_millis(1));
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/c.json"));
    }

    #[test]
    fn test_config_serialization_roundtrip() -> Result<()> {
        let mut config = AppConfig::default();
        config.discovery.max_depth = 6;
        config.discovery.extra_paths = vec![PathBuf::from("~/clients")];
        config.workspaces.push(PathBuf::from("/repo1"));

        let toml_str = toml::to_string(&config)?;
        assert!(toml_str.contains("timeout_secs = 10"));
        let parsed_config: AppConfig = toml::from_str(&toml_str)?;

        assert_eq!(config, parsed_config);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let parsed: AppConfig = toml::from_str("version = 1\n[discovery]\nmax_depth = 2\n")?;
        assert_eq!(parsed.discovery.max_depth, 2);
        assert_eq!(parsed.discovery.timeout, DEFAULT_TIMEOUT);
        Ok(())
    }

    #[test]
    fn test_config_load_nonexistent_creates_default() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = AppConfig::load(Some(config_path.clone()))?;

        assert_eq!(config, AppConfig::default());
        assert!(config_path.exists());

        Ok(())
    }

    #[test]
    fn test_cli_override() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test.toml");

        let mut original_config = AppConfig::default();
        original_config.discovery.max_depth = 8;
        original_config.discovery.workers = 2;
        original_config.save(&config_path)?;

        let cli_args = CliArgs::parse_from([
            "repodisco",
            "--config",
            config_path.to_str().unwrap_or_default(),
            "--max-depth",
            "3",
            "--ttl",
            "60",
        ]);

        let final_config = AppConfig::from_cli_and_file(&cli_args)?;
        assert_eq!(final_config.discovery.max_depth, 3);
        assert_eq!(final_config.discovery.cache_ttl, Duration::from_secs(60));
        // Untouched by the CLI
        assert_eq!(final_config.discovery.workers, 2);

        Ok(())
    }

    #[test]
    fn test_get_default_config_path() -> Result<()> {
        let path = get_default_config_path()?;
        assert!(path.ends_with("repodisco.toml"));
        Ok(())
    }
}
