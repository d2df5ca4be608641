mod cli;
mod config;
mod downloader;
mod error;
mod logging;
mod monitor;
mod parser;
mod progress;
mod prober;
mod stall;
mod tool;
mod types;

use anyhow::{bail, Context};
use clap::Parser;
use cli::Cli;
use colored::*;
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::Config::load(&cli.config)
        .with_context(|| format!("cannot start without {}", cli.config.display()))?;
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout = timeout;
    }

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("failed to create {}", config.output_dir.display()))?;
    let log_path = logging::init(&config.output_dir)?;
    info!("Starting m3u8 downloader, logging to {}", log_path.display());
    info!(
        "Config: url list={}, metadata={}, stall timeout={}s",
        config.url_list.display(),
        config.metadata_file.display(),
        config.timeout
    );

    let result = run(&config, !cli.no_progress).await;
    logging::flush();
    result
}

async fn run(config: &config::Config, show_progress: bool) -> anyhow::Result<()> {
    let names = parser::parse_metadata(&config.metadata_file).await?;
    info!("Loaded {} video names from metadata", names.len());

    let urls = match parser::read_url_list(&config.url_list).await {
        Ok(urls) => urls,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", format!("Error: {}", e).red());
            return Err(e.into());
        }
    };

    let monitor = monitor::TransferMonitor::new(config.tool(), Arc::new(logging::LogSink))
        .with_poll_interval(config.poll_interval())
        .with_progress(show_progress);
    let downloader =
        downloader::Downloader::new(monitor, config.stall_timeout(), config.pause_between());

    let summary = downloader
        .download_all(urls, &names, &config.output_dir)
        .await?;

    println!("\n{}", "Download Summary:".bold());
    println!("Total videos: {}", summary.total_downloads);
    println!(
        "Downloaded: {}",
        summary.successful_downloads.to_string().green()
    );
    println!(
        "Already present: {}",
        summary.existing_files.to_string().yellow()
    );
    println!("Stalled: {}", summary.stalled_downloads.to_string().yellow());
    println!("Failed: {}", summary.failed_downloads.to_string().red());
    println!("Total duration: {:.2?}", summary.total_duration);

    let unfinished: Vec<_> = summary
        .reports
        .iter()
        .filter(|r| {
            r.status == types::DownloadStatus::Failed || r.status == types::DownloadStatus::Stalled
        })
        .collect();
    if !unfinished.is_empty() {
        println!("\n{}", "Skipped Videos:".red().bold());
        for report in &unfinished {
            println!(
                "✗ {} ({:?})",
                report.task.file_name().red(),
                report.status
            );
            println!("  URL: {}", report.task.source_locator);
        }
    }

    if summary.has_failures() {
        error!(
            "{} downloads failed, {} stalled",
            summary.failed_downloads, summary.stalled_downloads
        );
        bail!("{} videos were not downloaded", unfinished.len());
    }

    println!("\n{}", "All videos downloaded".green());
    info!("All videos downloaded");
    Ok(())
}
