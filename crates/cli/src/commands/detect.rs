//! Detect command: run every anomaly detector over a transaction CSV.

use anyhow::{Context, Result};
use clap::Args;
use salesops_core::ConfigLoader;
use salesops_data::CsvStorage;
use salesops_engine::AnomalyEngine;

use crate::render::{renderer_for, OutputFormat};

/// Arguments for the detect command.
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Transaction CSV file
    #[arg(short, long)]
    pub data: String,

    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the full per-day report to this CSV file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Runs the detect command.
///
/// Insufficient history is printed as a status, not returned as an error.
///
/// # Errors
/// Returns an error if the config or CSV cannot be loaded, the input is
/// empty, or the report cannot be written.
pub async fn run_detect(args: DetectArgs) -> Result<()> {
    let config = ConfigLoader::load_from(&args.config)?;
    let engine = AnomalyEngine::new(config.detection)?;
    let transactions = CsvStorage::read_transactions(&args.data)?;
    let renderer = renderer_for(args.format);

    let report = match engine.run(&transactions).await {
        Ok(report) => report,
        Err(err) if !err.is_fatal() => {
            println!("{}", renderer.render_status(&err)?);
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("anomaly detection failed for {}", args.data))
        }
    };

    println!("{}", renderer.render_report(&report)?);

    if let Some(path) = &args.output {
        CsvStorage::write_table(path, &report.columns(), &report.to_records())?;
        tracing::info!(path = %path, rows = report.len(), "report written");
    }

    Ok(())
}
