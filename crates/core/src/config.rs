use serde::{Deserialize, Serialize};

use crate::error::AnomalyError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
}

/// Tuning for the anomaly engine.
///
/// Every constant here is empirically chosen; they are exposed so deployments
/// can override them from `config/Config.toml` or `SALESOPS_` environment
/// variables rather than editing code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum number of aggregated days before any detector runs.
    pub min_history_days: usize,
    /// |z| above this flags a day (population standard deviation).
    pub zscore_threshold: f64,
    /// |modified z| above this flags a day.
    pub mad_threshold: f64,
    /// Upper bound on a single model fit before it is abandoned.
    pub fit_timeout_ms: u64,
    pub isolation: IsolationConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Expected fraction of anomalous days.
    pub contamination: f64,
    pub n_estimators: usize,
    /// Rows drawn per tree. `None` means `min(256, n)`.
    pub max_samples: Option<usize>,
    pub seed: u64,
}

/// Shortest forward horizon accepted, in days.
pub const MIN_HORIZON_DAYS: usize = 7;
/// Longest forward horizon accepted, in days.
pub const MAX_HORIZON_DAYS: usize = 60;

/// Settings for the revenue model behind the interval-breach detector.
///
/// The model is an MSTL decomposition with a weekly period whose trend is an
/// automatically selected ETS model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub weekly_seasonality: bool,
    /// Leading fraction of the window the model is fitted on. The remaining
    /// days are predicted out of sample so a late level shift cannot be
    /// absorbed by the fit.
    pub fit_range: f64,
    /// Coverage of the predictive interval, e.g. 0.8 for an 80% band.
    pub interval_width: f64,
    /// ETS family searched for the trend: error, trend and season letters,
    /// `Z` for automatic and `N` for none. The season letter must be `N`.
    pub trend_spec: String,
    pub forward: ForwardForecastConfig,
}

/// Settings for the forward revenue projection. The anomaly check never
/// extrapolates, so these never affect detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardForecastConfig {
    /// Days projected when the caller does not choose a horizon.
    pub horizon_days: usize,
    pub interval_width: f64,
    /// Trend family for the projection. Forcing an additive trend lets the
    /// projection carry the recent slope instead of flattening it.
    pub trend_spec: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_history_days: 10,
            zscore_threshold: 3.0,
            mad_threshold: 3.5,
            fit_timeout_ms: 5_000,
            isolation: IsolationConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            contamination: 0.06,
            n_estimators: 100,
            max_samples: None,
            seed: 42,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            weekly_seasonality: true,
            fit_range: 0.8,
            interval_width: 0.8,
            trend_spec: "ZZN".to_string(),
            forward: ForwardForecastConfig::default(),
        }
    }
}

impl Default for ForwardForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: 21,
            interval_width: 0.8,
            trend_spec: "ZAN".to_string(),
        }
    }
}

impl DetectionConfig {
    /// Checks that thresholds and rates are usable.
    ///
    /// Model-specific sizing (`n_estimators`, `max_samples`) is left to the
    /// model itself, whose fit failure is absorbed by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`AnomalyError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), AnomalyError> {
        if self.min_history_days == 0 {
            return Err(AnomalyError::InvalidConfig(
                "min_history_days must be at least 1".to_string(),
            ));
        }
        if !(self.zscore_threshold > 0.0) {
            return Err(AnomalyError::InvalidConfig(format!(
                "zscore_threshold must be positive, got {}",
                self.zscore_threshold
            )));
        }
        if !(self.mad_threshold > 0.0) {
            return Err(AnomalyError::InvalidConfig(format!(
                "mad_threshold must be positive, got {}",
                self.mad_threshold
            )));
        }
        let contamination = self.isolation.contamination;
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(AnomalyError::InvalidConfig(format!(
                "isolation.contamination must be in (0, 0.5], got {contamination}"
            )));
        }
        self.forecast.validate()
    }
}

impl ForecastConfig {
    /// Checks the anomaly model and the forward projection settings.
    ///
    /// # Errors
    ///
    /// Returns [`AnomalyError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), AnomalyError> {
        let range = self.fit_range;
        if !(range > 0.0 && range <= 1.0) {
            return Err(AnomalyError::InvalidConfig(format!(
                "forecast.fit_range must be in (0, 1], got {range}"
            )));
        }
        check_width("forecast.interval_width", self.interval_width)?;
        check_trend_spec("forecast.trend_spec", &self.trend_spec)?;

        let forward = &self.forward;
        check_horizon(forward.horizon_days)?;
        check_width("forecast.forward.interval_width", forward.interval_width)?;
        check_trend_spec("forecast.forward.trend_spec", &forward.trend_spec)
    }
}

/// Rejects a forward horizon outside `MIN_HORIZON_DAYS..=MAX_HORIZON_DAYS`.
///
/// # Errors
///
/// Returns [`AnomalyError::InvalidConfig`] for an out-of-range horizon.
pub fn check_horizon(days: usize) -> Result<(), AnomalyError> {
    if (MIN_HORIZON_DAYS..=MAX_HORIZON_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(AnomalyError::InvalidConfig(format!(
            "forecast horizon must be {MIN_HORIZON_DAYS}..={MAX_HORIZON_DAYS} days, got {days}"
        )))
    }
}

fn check_width(field: &str, width: f64) -> Result<(), AnomalyError> {
    if width > 0.0 && width < 1.0 {
        Ok(())
    } else {
        Err(AnomalyError::InvalidConfig(format!(
            "{field} must be in (0, 1), got {width}"
        )))
    }
}

fn check_trend_spec(field: &str, spec: &str) -> Result<(), AnomalyError> {
    let letters: Vec<char> = spec.chars().collect();
    let valid = matches!(
        letters.as_slice(),
        ['Z' | 'A' | 'M', 'Z' | 'N' | 'A' | 'M', 'N']
    );
    if valid {
        Ok(())
    } else {
        Err(AnomalyError::InvalidConfig(format!(
            "{field} must be three ETS letters ending in N, got {spec:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = DetectionConfig::default();
        assert_eq!(config.min_history_days, 10);
        assert!((config.zscore_threshold - 3.0).abs() < f64::EPSILON);
        assert!((config.mad_threshold - 3.5).abs() < f64::EPSILON);
        assert!((config.isolation.contamination - 0.06).abs() < f64::EPSILON);
        assert_eq!(config.isolation.seed, 42);
        assert!(config.forecast.weekly_seasonality);
        assert!((config.forecast.interval_width - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn default_config_validates() {
        assert!(DetectionConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_history_requirement() {
        let config = DetectionConfig {
            min_history_days: 0,
            ..DetectionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnomalyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_contamination_out_of_range() {
        let mut config = DetectionConfig::default();
        config.isolation.contamination = 0.75;
        assert!(config.validate().is_err());

        config.isolation.contamination = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_nan_threshold() {
        let config = DetectionConfig {
            zscore_threshold: f64::NAN,
            ..DetectionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_degenerate_interval_width() {
        let mut config = DetectionConfig::default();
        config.forecast.interval_width = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn forward_projection_has_its_own_trend() {
        let config = ForecastConfig::default();
        assert_eq!(config.trend_spec, "ZZN");
        assert_eq!(config.forward.trend_spec, "ZAN");
        assert_eq!(config.forward.horizon_days, 21);

        let mut config = DetectionConfig::default();
        config.forecast.forward.trend_spec = "AMN".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.forecast.trend_spec, "ZZN");
    }

    #[test]
    fn rejects_seasonal_or_malformed_trend_spec() {
        for spec in ["ZZA", "ZZ", "XAN", "zzn", "ZZNN"] {
            let mut config = DetectionConfig::default();
            config.forecast.trend_spec = spec.to_string();
            assert!(config.validate().is_err(), "{spec} accepted");
        }
    }

    #[test]
    fn horizon_is_bounded() {
        assert!(check_horizon(MIN_HORIZON_DAYS).is_ok());
        assert!(check_horizon(MAX_HORIZON_DAYS).is_ok());
        assert!(check_horizon(MIN_HORIZON_DAYS - 1).is_err());
        assert!(check_horizon(60_000).is_err());

        let mut config = DetectionConfig::default();
        config.forecast.forward.horizon_days = 90;
        assert!(matches!(
            config.validate(),
            Err(AnomalyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_empty_fit_range() {
        let mut config = DetectionConfig::default();
        config.forecast.fit_range = 0.0;
        assert!(config.validate().is_err());
        config.forecast.fit_range = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"detection": {"zscore_threshold": 2.5}}"#).unwrap();
        assert!((config.detection.zscore_threshold - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.detection.min_history_days, 10);
        assert_eq!(config.detection.isolation.n_estimators, 100);
    }
}
