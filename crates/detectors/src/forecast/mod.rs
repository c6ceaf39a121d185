//! Seasonal forecast and the interval-breach detector built on it.

mod model;

pub use model::{Projection, SeasonalForecaster};

use std::collections::HashMap;

use chrono::NaiveDate;
use salesops_core::{DailyOperations, DetectorFitFailure, ForecastConfig, ForecastPoint};

/// Flags and the in-sample band they were derived from.
#[derive(Debug, Clone)]
pub struct IntervalBreaches {
    pub flags: Vec<bool>,
    pub points: Vec<ForecastPoint>,
}

/// Fits the model on daily revenue and flags days outside their band.
///
/// The band covers the observed window only; nothing past the last day is
/// forecast.
///
/// # Errors
///
/// Propagates the model's [`DetectorFitFailure`]; the caller decides how to degrade.
pub fn revenue_interval_breaches(
    days: &[DailyOperations],
    config: &ForecastConfig,
) -> Result<IntervalBreaches, DetectorFitFailure> {
    let observations: Vec<(NaiveDate, f64)> = days.iter().map(|d| (d.date, d.revenue)).collect();
    let points = SeasonalForecaster::new(config.clone()).predict_history(&observations)?;
    let flags = breach_flags(days, &points);
    Ok(IntervalBreaches { flags, points })
}

/// Joins forecast points to days by date; a day without a point is not flagged.
#[must_use]
pub fn breach_flags(days: &[DailyOperations], points: &[ForecastPoint]) -> Vec<bool> {
    let by_date: HashMap<NaiveDate, &ForecastPoint> = points.iter().map(|p| (p.date, p)).collect();
    days.iter()
        .map(|day| {
            by_date
                .get(&day.date)
                .is_some_and(|point| point.is_breach(day.revenue))
        })
        .collect()
}
