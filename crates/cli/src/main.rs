use std::time::Duration;

use clap::{Parser, Subcommand};

mod commands;
mod render;

use commands::{DetectArgs, ForecastArgs};

#[derive(Parser)]
#[command(name = "salesops")]
#[command(about = "Anomaly detection over daily sales operations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flag anomalous days with every detector and show which ones fired
    Detect(DetectArgs),
    /// Fit the seasonal revenue model and project it forward
    Forecast(ForecastArgs),
}

/// How long a finished command waits for model fits abandoned at their deadline.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    // Dropping the runtime would block on detached fits still sleeping in the pool.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Detect(args) => {
            commands::run_detect(args).await?;
        }
        Commands::Forecast(args) => {
            commands::run_forecast(args).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::OutputFormat;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn detect_defaults() {
        let cli = Cli::try_parse_from(["salesops", "detect", "--data", "orders.csv"]).unwrap();
        let Commands::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert_eq!(args.config, "config/Config.toml");
        assert_eq!(args.format, OutputFormat::Text);
        assert!(args.output.is_none());
    }

    #[test]
    fn forecast_accepts_horizon_and_json() {
        let cli = Cli::try_parse_from([
            "salesops", "forecast", "-d", "orders.csv", "--horizon", "14", "-f", "json",
        ])
        .unwrap();
        let Commands::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.horizon, Some(14));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn forecast_horizon_is_bounded() {
        let parse = |horizon: &str| {
            Cli::try_parse_from(["salesops", "forecast", "-d", "orders.csv", "--horizon", horizon])
        };
        for horizon in ["6", "61", "60000"] {
            assert!(parse(horizon).is_err(), "horizon {horizon} accepted");
        }
        assert!(parse("7").is_ok());
        assert!(parse("60").is_ok());
    }
}
