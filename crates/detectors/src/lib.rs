//! Anomaly detectors over the daily operations frame.
//!
//! Every detector emits one boolean per day, aligned with the input order.
//! Fitted models report failure through [`DetectorFitFailure`] instead of
//! panicking; the engine decides how to degrade.
//!
//! [`DetectorFitFailure`]: salesops_core::DetectorFitFailure

pub mod detector;
pub mod forecast;
pub mod isolation;
pub mod robust;

pub use detector::{Detector, DetectorFamily};
pub use forecast::{
    breach_flags, revenue_interval_breaches, IntervalBreaches, Projection, SeasonalForecaster,
};
pub use isolation::{daily_features, IsolationForest};
pub use robust::{mad_flags, mad_metric, zscore_flags, zscore_metric};
