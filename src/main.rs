use anyhow::{anyhow, Result};
use clap::Parser;
use repodisco::cli::CliArgs;
use repodisco::{AppConfig, DiscoverReq, DiscoveredRepo, Discoverer, DiscoveryResult};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

fn main() {
    // Logs go to stderr so stdout stays clean for --json
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(CliArgs::parse()) {
        error!("Discovery failed: {:#}", err);
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli_args: CliArgs) -> Result<()> {
    let config = AppConfig::from_cli_and_file(&cli_args)?;
    let discoverer = Discoverer::new(config.discovery.clone());

    let configured: HashMap<_, _> = config.workspaces.iter().map(|p| (p.clone(), true)).collect();
    discoverer.set_configured_paths(&configured);

    if cli_args.invalidate {
        discoverer.invalidate_cache()?;
        info!(path = %discoverer.config().cache_path().display(), "Discovery cache removed");
        return Ok(());
    }

    let req = DiscoverReq::new(cli_args.paths.clone());

    if cli_args.stream {
        return stream(&discoverer, req, cli_args.json);
    }

    let result = if cli_args.fresh {
        discoverer.discover_fresh(req)?
    } else {
        discoverer.discover(req)?
    };

    if cli_args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    // Let a stale-cache refresh land before the process exits
    if result.refresh_in_progress {
        let limit = discoverer.config().timeout + Duration::from_secs(1);
        if !discoverer.wait_for_refresh(limit) {
            info!("Background refresh still running at exit");
        }
    }
    Ok(())
}

fn stream(discoverer: &Discoverer, req: DiscoverReq, json: bool) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let worker = discoverer.clone();
    let handle = thread::spawn(move || worker.discover_streaming(req, tx));

    // Ends when the engine closes the channel
    for repo in rx {
        if json {
            println!("{}", serde_json::to_string(&repo)?);
        } else {
            print_repo(&repo);
        }
    }

    let stats = handle
        .join()
        .map_err(|_| anyhow!("Streaming discovery thread panicked"))??;
    info!(
        scanned = stats.scanned_dirs,
        skipped = stats.skipped_dirs,
        timed_out = stats.timed_out,
        "Streaming discovery done"
    );
    Ok(())
}

fn print_repo(repo: &DiscoveredRepo) {
    let marker = if repo.is_configured { "*" } else { " " };
    if repo.remote_url.is_empty() {
        println!("{} {:<32} {}", marker, repo.name, repo.path.display());
    } else {
        println!("{} {:<32} {}  [{}]", marker, repo.name, repo.path.display(), repo.remote_url);
    }
}

fn print_result(result: &DiscoveryResult) {
    for repo in &result.repositories {
        print_repo(repo);
    }

    let source = match (result.cached, result.cache_age_ms) {
        (true, Some(age_ms)) => format!("cache, {}s old", age_ms / 1000),
        _ => format!(
            "scan, {} dirs read, {} skipped",
            result.scanned_dirs, result.skipped_dirs
        ),
    };
    println!();
    println!("{} repositories ({}) in {} ms", result.count, source, result.elapsed_ms);
    if result.timed_out {
        println!("Scan timed out; results may be incomplete");
    }
    if result.refresh_in_progress {
        println!("Refreshing in background");
    }
}
