//! Multi-detector anomaly engine for daily sales operations.
//!
//! [`AnomalyEngine`] aggregates transactions into a daily frame, refuses to
//! run on too little history, fans out to the robust statistics, the
//! isolation forest and the seasonal forecast, and combines their columns
//! into an [`AnomalyReport`]. Model fits that fail, panic or overrun their
//! deadline degrade to all-`false` columns; see [`guard`].

pub mod guard;
pub mod pipeline;
pub mod report;

pub use guard::DetectorStatus;
pub use pipeline::{AnomalyEngine, ForecastError, RevenueForecast};
pub use report::{AnomalyReport, AnomalyRow, DetectorSummary, FlagCombiner, FlaggedDay, ForecastBand};
