//! CLI commands for the sales operations anomaly engine.

pub mod detect;
pub mod forecast;

pub use detect::{run_detect, DetectArgs};
pub use forecast::{run_forecast, ForecastArgs};
