//! Destripe CLI: correct a batch of calibrated frames.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use destripe::{Config, Destriper, FrameJob};

#[derive(Parser)]
#[command(name = "destripe")]
#[command(about = "Remove row and column stripes from NIRCam and MIRI frames")]
#[command(version)]
struct Cli {
    /// Calibrated FITS frames to correct.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// YAML configuration; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving corrected frames.
    #[arg(long, default_value = "destriped")]
    out_dir: PathBuf,

    /// Recompute frames whose output already exists.
    #[arg(long)]
    overwrite: bool,

    /// Log filter, overridden by RUST_LOG.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write daily log files to this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write the batch report (JSON) to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    common::log_setup::setup_logging(&cli.log_level, "destripe", cli.log_dir.as_deref());

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    config.overwrite |= cli.overwrite;

    let jobs: Vec<FrameJob> = cli
        .files
        .iter()
        .map(|input| FrameJob::in_dir(input, &cli.out_dir))
        .collect();
    tracing::info!(
        frames = jobs.len(),
        out_dir = %cli.out_dir.display(),
        overwrite = config.overwrite,
        "Starting batch"
    );

    let destriper = Destriper::new(&config).context("Invalid configuration")?;
    let report = destriper.run_batch(&jobs);

    if let Some(path) = &cli.report {
        let json = report.to_json().context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
