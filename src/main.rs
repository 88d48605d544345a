//! hunter-cache-upload - push a local Hunter cache tree to GitHub
//!
//! CLI entry point: parse arguments, validate configuration, scan the
//! cache, then run the three upload passes in order (raw archives,
//! metadata payload, completion markers last).

use clap::Parser;
use console::style;
use hunter_cache_upload::cli::Cli;
use hunter_cache_upload::config::Config;
use hunter_cache_upload::entry::MetaPass;
use hunter_cache_upload::error::UploadResult;
use hunter_cache_upload::github::GithubClient;
use hunter_cache_upload::scanner::Cache;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> UploadResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = info, 1 = debug, 2+ = trace
    let filter = match cli.verbose {
        0 => EnvFilter::new("hunter_cache_upload=info"),
        1 => EnvFilter::new("hunter_cache_upload=debug"),
        _ => EnvFilter::new("hunter_cache_upload=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_cli(&cli)?;

    let mut cache = Cache::scan(&config.cache_dir, &config.temp_dir)?;
    cache.retain_local();

    if cache.is_empty() {
        info!("Nothing to upload");
        return Ok(());
    }

    cache.ensure_temp_dir()?;

    let client = GithubClient::connect(&config)?;

    cache.upload_all_raw(&client)?;
    cache.upload_all_meta(&client, MetaPass::Payload)?;
    info!("Uploading DONE files");
    // Markers go last so a remotely visible marker guarantees its files
    // are already uploaded.
    cache.upload_all_meta(&client, MetaPass::Markers)?;

    Ok(())
}
