//! Per-metric scalar detectors: population z-score and MAD modified z-score.
//!
//! Both are pure functions returning one flag per input value. A series with
//! no spread (constant, single point, empty) yields all-`false` rather than an
//! error, so the combiner never has to special-case them. Non-finite values
//! (a day with no reported marketing cost) are left out of the statistics and
//! never flagged.

use salesops_core::stats::{mean, median, population_std};
use salesops_core::{DailyOperations, Metric};

/// Scale factor making MAD consistent with the standard deviation of a normal.
pub const MAD_CONSISTENCY: f64 = 0.6745;

/// Flags values whose population z-score exceeds `threshold` in magnitude.
///
/// # Examples
/// ```
/// use salesops_detectors::robust::zscore_flags;
///
/// assert_eq!(zscore_flags(&[5.0, 5.0, 5.0], 3.0), vec![false, false, false]);
/// ```
#[must_use]
pub fn zscore_flags(series: &[f64], threshold: f64) -> Vec<bool> {
    let observed = finite_values(series);
    let (Some(mu), Some(sigma)) = (mean(&observed), population_std(&observed)) else {
        return vec![false; series.len()];
    };
    if !sigma.is_finite() || sigma < f64::EPSILON {
        return vec![false; series.len()];
    }

    series
        .iter()
        .map(|x| ((x - mu) / sigma).abs() > threshold)
        .collect()
}

/// Flags values whose modified z-score `0.6745 * (x - median) / MAD` exceeds
/// `threshold` in magnitude.
#[must_use]
pub fn mad_flags(series: &[f64], threshold: f64) -> Vec<bool> {
    let observed = finite_values(series);
    let Some(med) = median(&observed) else {
        return vec![false; series.len()];
    };
    let deviations: Vec<f64> = observed.iter().map(|x| (x - med).abs()).collect();
    let mad = median(&deviations).unwrap_or(0.0);
    if !mad.is_finite() || mad == 0.0 {
        return vec![false; series.len()];
    }

    series
        .iter()
        .map(|x| (MAD_CONSISTENCY * (x - med) / mad).abs() > threshold)
        .collect()
}

fn finite_values(series: &[f64]) -> Vec<f64> {
    series.iter().copied().filter(|x| x.is_finite()).collect()
}

/// Applies [`zscore_flags`] to one metric of the daily frame.
#[must_use]
pub fn zscore_metric(days: &[DailyOperations], metric: Metric, threshold: f64) -> Vec<bool> {
    zscore_flags(&metric.series(days), threshold)
}

/// Applies [`mad_flags`] to one metric of the daily frame.
#[must_use]
pub fn mad_metric(days: &[DailyOperations], metric: Metric, threshold: f64) -> Vec<bool> {
    mad_flags(&metric.series(days), threshold)
}
