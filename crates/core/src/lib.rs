//! Core types for the sales operations anomaly engine.
//!
//! This crate provides:
//! - Domain records (`RawTransaction`, `DailyOperations`, `ForecastPoint`)
//! - The caller-facing error taxonomy and per-detector fit failures
//! - Detection configuration and its figment-based loader
//! - Descriptive statistics shared by the detectors

pub mod config;
pub mod config_loader;
pub mod error;
pub mod models;
pub mod stats;

pub use config::{
    AppConfig, DetectionConfig, ForecastConfig, ForwardForecastConfig, IsolationConfig,
};
pub use config_loader::ConfigLoader;
pub use error::{AnomalyError, DetectorFitFailure};
pub use models::{DailyOperations, ForecastPoint, Metric, ProfitSource, RawTransaction};
