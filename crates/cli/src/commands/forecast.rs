//! Forecast command: project daily revenue with its predictive interval.

use anyhow::{Context, Result};
use clap::Args;
use salesops_core::config::{MAX_HORIZON_DAYS, MIN_HORIZON_DAYS};
use salesops_core::ConfigLoader;
use salesops_data::CsvStorage;
use salesops_engine::{AnomalyEngine, ForecastError};

use crate::render::{renderer_for, OutputFormat};

/// Arguments for the forecast command.
#[derive(Args, Debug, Clone)]
pub struct ForecastArgs {
    /// Transaction CSV file
    #[arg(short, long)]
    pub data: String,

    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Days to project past the last observed day, 7 to 60 (defaults to
    /// forecast.forward.horizon_days)
    #[arg(
        long,
        value_parser = clap::value_parser!(u16)
            .range(MIN_HORIZON_DAYS as i64..=MAX_HORIZON_DAYS as i64)
    )]
    pub horizon: Option<u16>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the projected points to this CSV file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Runs the forecast command.
///
/// # Errors
/// Returns an error if inputs cannot be loaded, history is too short, or the
/// model cannot be fitted.
pub async fn run_forecast(args: ForecastArgs) -> Result<()> {
    let config = ConfigLoader::load_from(&args.config)?;
    let horizon = args
        .horizon
        .map_or(config.detection.forecast.forward.horizon_days, usize::from);
    let engine = AnomalyEngine::new(config.detection)?;
    let transactions = CsvStorage::read_transactions(&args.data)?;
    let renderer = renderer_for(args.format);

    let forecast = match engine.forecast(&transactions, horizon).await {
        Ok(forecast) => forecast,
        Err(ForecastError::Input(err)) if !err.is_fatal() => {
            println!("{}", renderer.render_status(&err)?);
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("revenue forecast failed for {}", args.data))
        }
    };

    println!("{}", renderer.render_forecast(&forecast)?);

    if let Some(path) = &args.output {
        let rows: Vec<Vec<String>> = forecast
            .future
            .iter()
            .map(|p| {
                vec![
                    p.date.to_string(),
                    p.predicted.to_string(),
                    p.lower.to_string(),
                    p.upper.to_string(),
                ]
            })
            .collect();
        CsvStorage::write_table(path, &["date", "predicted", "lower", "upper"], &rows)?;
        tracing::info!(path = %path, rows = rows.len(), "forecast written");
    }

    Ok(())
}
