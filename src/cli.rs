use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "repodisco")]
#[command(about = "Discover Git repositories under your project folders")]
pub struct CliArgs {
    /// Directories to scan (defaults to common project folders under $HOME)
    pub paths: Vec<PathBuf>,

    /// Ignore the cache and rescan now
    #[arg(long, conflicts_with = "stream")]
    pub fresh: bool,

    /// Print repositories as they are found
    #[arg(long)]
    pub stream: bool,

    /// Delete the discovery cache and exit
    #[arg(long, conflicts_with_all = ["fresh", "stream"])]
    pub invalidate: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Maximum directory depth below each search path (0 = unlimited)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Number of scanner threads (default: logical CPUs)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Scan timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Cache time-to-live in seconds
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Path to the discovery cache file
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args() {
        let args = CliArgs::parse_from(["repodisco"]);
        assert!(args.paths.is_empty());
        assert!(!args.fresh);
        assert!(!args.stream);
        assert_eq!(args.config, None);
        assert_eq!(args.max_depth, None);
    }

    #[test]
    fn test_cli_parse_paths_and_flags() {
        let args = CliArgs::parse_from([
            "repodisco",
            "/code",
            "~/work",
            "--fresh",
            "--max-depth",
            "6",
            "--config",
            "/custom/config.toml",
        ]);
        assert_eq!(args.paths, vec![PathBuf::from("/code"), PathBuf::from("~/work")]);
        assert!(args.fresh);
        assert_eq!(args.max_depth, Some(6));
        assert_eq!(args.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_cli_fresh_conflicts_with_stream() {
        let result = CliArgs::try_parse_from(["repodisco", "--fresh", "--stream"]);
        assert!(result.is_err());
    }
}
