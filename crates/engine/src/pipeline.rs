//! The anomaly pipeline: aggregate, guard, detect, combine.

use std::time::Duration;

use salesops_core::config::check_horizon;
use salesops_core::{
    AnomalyError, DailyOperations, DetectionConfig, DetectorFitFailure, ForecastPoint, Metric,
    RawTransaction,
};
use salesops_data::DailyAggregator;
use salesops_detectors::{
    daily_features, mad_metric, revenue_interval_breaches, zscore_metric, Detector,
    IntervalBreaches, IsolationForest, Projection, SeasonalForecaster,
};
use tracing::{info, warn};

use crate::guard::{degrade, guarded_fit};
use crate::report::{AnomalyReport, FlagCombiner};

/// Runs every detector over the daily frame built from a batch of transactions.
///
/// Each call recomputes from scratch; nothing is cached between runs.
#[derive(Debug, Clone)]
pub struct AnomalyEngine {
    config: DetectionConfig,
}

impl AnomalyEngine {
    /// Creates an engine after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AnomalyError::InvalidConfig`] when validation fails.
    pub fn new(config: DetectionConfig) -> Result<Self, AnomalyError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Aggregates `transactions` and runs all detectors.
    ///
    /// # Errors
    ///
    /// - [`AnomalyError::EmptyInput`] when `transactions` is empty.
    /// - [`AnomalyError::InsufficientHistory`] when fewer than
    ///   `min_history_days` distinct days remain after aggregation. No
    ///   detector runs in that case.
    ///
    /// Detector fit failures never surface here; they degrade to all-`false`
    /// columns recorded in the report's statuses.
    pub async fn run(&self, transactions: &[RawTransaction]) -> Result<AnomalyReport, AnomalyError> {
        let days = DailyAggregator::aggregate(transactions)?;
        self.detect(days).await
    }

    /// Runs all detectors on an already aggregated frame.
    ///
    /// # Errors
    ///
    /// Same as [`AnomalyEngine::run`].
    pub async fn detect(&self, days: Vec<DailyOperations>) -> Result<AnomalyReport, AnomalyError> {
        if days.is_empty() {
            return Err(AnomalyError::EmptyInput);
        }
        self.ensure_history(days.len())?;

        let deadline = Duration::from_millis(self.config.fit_timeout_ms);
        let isolation = {
            let rows = daily_features(&days);
            let config = self.config.isolation.clone();
            guarded_fit(deadline, move || IsolationForest::fit_predict(&rows, &config))
        };
        let forecast = {
            let frame = days.clone();
            let config = self.config.forecast.clone();
            guarded_fit(deadline, move || revenue_interval_breaches(&frame, &config))
        };
        let (isolation, forecast) = tokio::join!(isolation, forecast);

        let robust: Vec<(Detector, Vec<bool>)> = Metric::ALL
            .into_iter()
            .flat_map(|metric| {
                [
                    (
                        Detector::ZScore(metric),
                        zscore_metric(&days, metric, self.config.zscore_threshold),
                    ),
                    (
                        Detector::Mad(metric),
                        mad_metric(&days, metric, self.config.mad_threshold),
                    ),
                ]
            })
            .collect();

        let n = days.len();
        let mut combiner = FlagCombiner::new(days);
        for (detector, flags) in robust {
            combiner = combiner.with_flags(detector, flags);
        }

        let (iso_flags, iso_status) = degrade(Detector::IsolationForest, isolation, n);
        combiner = combiner
            .with_flags(Detector::IsolationForest, iso_flags)
            .with_status(Detector::IsolationForest, iso_status);

        let (points, forecast) = split_breaches(forecast);
        let (forecast_flags, forecast_status) = degrade(Detector::ForecastInterval, forecast, n);
        combiner = combiner
            .with_flags(Detector::ForecastInterval, forecast_flags)
            .with_status(Detector::ForecastInterval, forecast_status);
        if let Some(points) = points {
            combiner = combiner.with_forecast(points);
        }

        Ok(combiner.assemble())
    }

    /// Fits the seasonal model on daily revenue with the `forecast.forward`
    /// settings and projects `horizon` days ahead.
    ///
    /// Unlike [`AnomalyEngine::run`], a fit failure is returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::Input`] for a horizon outside
    /// `MIN_HORIZON_DAYS..=MAX_HORIZON_DAYS`, empty input or short history, and
    /// [`ForecastError::Fit`] when the model cannot be fitted in time.
    pub async fn forecast(
        &self,
        transactions: &[RawTransaction],
        horizon: usize,
    ) -> Result<RevenueForecast, ForecastError> {
        check_horizon(horizon)?;
        let days = DailyAggregator::aggregate(transactions)?;
        self.ensure_history(days.len())?;

        let observations: Vec<_> = days.iter().map(|d| (d.date, d.revenue)).collect();
        let forecaster = SeasonalForecaster::new(self.config.forecast.clone());
        let deadline = Duration::from_millis(self.config.fit_timeout_ms);
        let Projection { history, future } =
            guarded_fit(deadline, move || forecaster.project(&observations, horizon)).await?;

        info!(history = history.len(), horizon, "revenue forecast computed");
        Ok(RevenueForecast {
            actuals: days,
            history,
            future,
        })
    }

    fn ensure_history(&self, days: usize) -> Result<(), AnomalyError> {
        let required = self.config.min_history_days;
        if days < required {
            warn!(days, required, "insufficient history, skipping detectors");
            return Err(AnomalyError::InsufficientHistory { days, required });
        }
        Ok(())
    }
}

/// Separates the band from the flags so a failed fit drops both.
fn split_breaches(
    outcome: Result<IntervalBreaches, DetectorFitFailure>,
) -> (Option<Vec<ForecastPoint>>, Result<Vec<bool>, DetectorFitFailure>) {
    match outcome {
        Ok(IntervalBreaches { flags, points }) => (Some(points), Ok(flags)),
        Err(failure) => (None, Err(failure)),
    }
}

/// In-sample fit and forward projection of daily revenue.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RevenueForecast {
    pub actuals: Vec<DailyOperations>,
    pub history: Vec<ForecastPoint>,
    pub future: Vec<ForecastPoint>,
}

/// Why a forward forecast could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForecastError {
    #[error(transparent)]
    Input(#[from] AnomalyError),
    #[error(transparent)]
    Fit(#[from] DetectorFitFailure),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn frame(n: u32) -> Vec<DailyOperations> {
        (1..=n)
            .map(|d| DailyOperations {
                date: NaiveDate::from_ymd_opt(2025, 7, d).unwrap(),
                revenue: 1000.0
                    + f64::from(d) * 4.0
                    + f64::from(d % 7) * 30.0
                    + f64::from(d * 3 % 5) * 5.0,
                profit: 20.0 + f64::from(d % 3),
                cac: 8.0 + f64::from(d % 4) * 0.5,
            })
            .collect()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DetectionConfig {
            zscore_threshold: 0.0,
            ..DetectionConfig::default()
        };
        assert!(matches!(
            AnomalyEngine::new(config),
            Err(AnomalyError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn empty_frame_is_fatal() {
        let engine = AnomalyEngine::new(DetectionConfig::default()).unwrap();
        assert_eq!(engine.detect(Vec::new()).await, Err(AnomalyError::EmptyInput));
    }

    #[tokio::test]
    async fn short_frame_skips_detectors() {
        let engine = AnomalyEngine::new(DetectionConfig::default()).unwrap();
        let err = engine.detect(frame(9)).await.unwrap_err();
        assert_eq!(
            err,
            AnomalyError::InsufficientHistory {
                days: 9,
                required: 10
            }
        );
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn healthy_frame_reports_ok_statuses() {
        let engine = AnomalyEngine::new(DetectionConfig::default()).unwrap();
        let report = engine.detect(frame(21)).await.unwrap();
        assert_eq!(report.len(), 21);
        assert!(report.status(Detector::IsolationForest).is_ok());
        assert!(report.status(Detector::ForecastInterval).is_ok());
        assert!(report.has_forecast());
    }

    #[tokio::test]
    async fn unusable_revenue_degrades_only_the_forecast() {
        let mut days = frame(21);
        days[6].revenue = f64::NAN;
        let engine = AnomalyEngine::new(DetectionConfig::default()).unwrap();
        let report = engine.detect(days).await.unwrap();

        assert_eq!(report.len(), 21);
        assert!(!report.status(Detector::ForecastInterval).is_ok());
        assert!(report.column(Detector::ForecastInterval).iter().all(|f| !f));
        assert!(!report.has_forecast());
        assert!(report.status(Detector::IsolationForest).is_ok());
    }

    #[tokio::test]
    async fn out_of_range_horizon_is_rejected_before_fitting() {
        let engine = AnomalyEngine::new(DetectionConfig::default()).unwrap();
        for horizon in [0, 6, 61, 60_000] {
            let err = engine.forecast(&[], horizon).await.unwrap_err();
            assert!(
                matches!(err, ForecastError::Input(AnomalyError::InvalidConfig(_))),
                "horizon {horizon} gave {err:?}"
            );
        }
    }
}
