//! Weekly-seasonal revenue model with predictive intervals.
//!
//! Daily values are laid on a contiguous calendar, with missing days linearly
//! interpolated. MSTL splits off a weekly seasonal component and an
//! automatically selected ETS model forecasts the rest. Series shorter than
//! two weeks, or with weekly seasonality disabled, go to ETS directly.
//!
//! The in-sample band covers the leading `fit_range` of the calendar. The
//! trailing days are forecast out of sample from that fit, so a level shift
//! near the end of the window stays outside the band instead of being
//! absorbed by the smoother.

use std::fmt::Display;

use augurs::ets::AutoETS;
use augurs::mstl::MSTLModel;
use augurs::prelude::*;
use chrono::{Duration, NaiveDate};
use salesops_core::{DetectorFitFailure, ForecastConfig, ForecastPoint};
use tracing::debug;

const WEEK: usize = 7;
const MIN_OBSERVATIONS: usize = 3;

/// Unfitted model; holds configuration only.
pub struct SeasonalForecaster {
    config: ForecastConfig,
}

/// In-sample band and forward projection from one fit over the full history.
#[derive(Debug, Clone)]
pub struct Projection {
    pub history: Vec<ForecastPoint>,
    pub future: Vec<ForecastPoint>,
}

/// Observations laid out one value per calendar day.
struct DailySeries {
    start: NaiveDate,
    values: Vec<f64>,
    /// Calendar offsets of the observed days, ascending.
    observed: Vec<usize>,
}

struct Band {
    point: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl SeasonalForecaster {
    #[must_use]
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// Band for every observed day, never extending past the last one.
    ///
    /// Observations need not be sorted or evenly spaced, but dates must be
    /// distinct.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorFitFailure`] for fewer than 3 observations, duplicate
    /// dates, non-finite values, or a model that cannot be fitted.
    pub fn predict_history(
        &self,
        observations: &[(NaiveDate, f64)],
    ) -> Result<Vec<ForecastPoint>, DetectorFitFailure> {
        let series = DailySeries::from_observations(observations)?;
        let len = series.values.len();
        let fit_len = ((len as f64 * self.config.fit_range).floor() as usize)
            .clamp(MIN_OBSERVATIONS, len);

        let (in_sample, ahead) = fit_and_predict(
            &series.values[..fit_len],
            &self.config.trend_spec,
            self.config.weekly_seasonality,
            self.config.interval_width,
            len - fit_len,
        )?;

        debug!(
            days = len,
            fit_days = fit_len,
            observed = series.observed.len(),
            "revenue band predicted"
        );

        Ok(series
            .observed
            .iter()
            .map(|&offset| {
                let (band, index) = if offset < fit_len {
                    (&in_sample, offset)
                } else {
                    (&ahead, offset - fit_len)
                };
                band.point_at(series.date_at(offset), index)
            })
            .collect())
    }

    /// Fits the whole history with the forward settings and projects
    /// `horizon` days past the last observed day.
    ///
    /// # Errors
    ///
    /// Same conditions as [`SeasonalForecaster::predict_history`].
    pub fn project(
        &self,
        observations: &[(NaiveDate, f64)],
        horizon: usize,
    ) -> Result<Projection, DetectorFitFailure> {
        let series = DailySeries::from_observations(observations)?;
        let forward = &self.config.forward;
        let (in_sample, ahead) = fit_and_predict(
            &series.values,
            &forward.trend_spec,
            self.config.weekly_seasonality,
            forward.interval_width,
            horizon,
        )?;

        let last = series.values.len() - 1;
        let history = series
            .observed
            .iter()
            .map(|&offset| in_sample.point_at(series.date_at(offset), offset))
            .collect();
        let future = (0..horizon)
            .map(|h| ahead.point_at(series.date_at(last + 1 + h), h))
            .collect();

        Ok(Projection { history, future })
    }
}

impl DailySeries {
    fn from_observations(observations: &[(NaiveDate, f64)]) -> Result<Self, DetectorFitFailure> {
        if observations.len() < MIN_OBSERVATIONS {
            return Err(DetectorFitFailure::new(format!(
                "forecast needs at least {MIN_OBSERVATIONS} observations, got {}",
                observations.len()
            )));
        }
        if observations.iter().any(|(_, y)| !y.is_finite()) {
            return Err(DetectorFitFailure::new("series contains non-finite values"));
        }

        let mut sorted = observations.to_vec();
        sorted.sort_by_key(|(date, _)| *date);
        if sorted.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(DetectorFitFailure::new("duplicate dates in series"));
        }

        let start = sorted[0].0;
        let offset = |date: NaiveDate| (date - start).num_days() as usize;
        let observed: Vec<usize> = sorted.iter().map(|(date, _)| offset(*date)).collect();

        let mut values = vec![0.0; observed[observed.len() - 1] + 1];
        for (pair, offsets) in sorted.windows(2).zip(observed.windows(2)) {
            let (from, to) = (offsets[0], offsets[1]);
            let step = (pair[1].1 - pair[0].1) / (to - from) as f64;
            for (k, value) in values[from..to].iter_mut().enumerate() {
                *value = pair[0].1 + step * k as f64;
            }
        }
        let last = values.len() - 1;
        values[last] = sorted[sorted.len() - 1].1;

        Ok(Self {
            start,
            values,
            observed,
        })
    }

    fn date_at(&self, offset: usize) -> NaiveDate {
        self.start + Duration::days(offset as i64)
    }
}

impl Band {
    fn empty() -> Self {
        Self {
            point: Vec::new(),
            lower: Vec::new(),
            upper: Vec::new(),
        }
    }

    fn from_parts(
        point: Vec<f64>,
        intervals: Option<(Vec<f64>, Vec<f64>)>,
        expected: usize,
    ) -> Result<Self, DetectorFitFailure> {
        let (lower, upper) =
            intervals.ok_or_else(|| DetectorFitFailure::new("model returned no interval"))?;
        if point.len() != expected || lower.len() != expected || upper.len() != expected {
            return Err(DetectorFitFailure::new(format!(
                "model returned {} points for {expected} days",
                point.len()
            )));
        }
        if point.iter().chain(&lower).chain(&upper).any(|v| !v.is_finite()) {
            return Err(DetectorFitFailure::new("fit did not converge to finite values"));
        }
        Ok(Self { point, lower, upper })
    }

    fn point_at(&self, date: NaiveDate, index: usize) -> ForecastPoint {
        ForecastPoint {
            date,
            predicted: self.point[index],
            lower: self.lower[index],
            upper: self.upper[index],
        }
    }
}

/// Fits `values` and returns the in-sample band plus `horizon` days ahead.
fn fit_and_predict(
    values: &[f64],
    trend_spec: &str,
    weekly: bool,
    level: f64,
    horizon: usize,
) -> Result<(Band, Band), DetectorFitFailure> {
    let ets = AutoETS::new(1, trend_spec).map_err(fit_failure)?;

    if weekly && values.len() >= 2 * WEEK {
        let fitted = MSTLModel::new(vec![WEEK], ets.into_trend_model())
            .fit(values)
            .map_err(fit_failure)?;
        let in_sample = fitted.predict_in_sample(level).map_err(fit_failure)?;
        let in_sample = Band::from_parts(
            in_sample.point,
            in_sample.intervals.map(|i| (i.lower, i.upper)),
            values.len(),
        )?;
        if horizon == 0 {
            return Ok((in_sample, Band::empty()));
        }
        let ahead = fitted.predict(horizon, level).map_err(fit_failure)?;
        let ahead = Band::from_parts(
            ahead.point,
            ahead.intervals.map(|i| (i.lower, i.upper)),
            horizon,
        )?;
        Ok((in_sample, ahead))
    } else {
        let fitted = ets.fit(values).map_err(fit_failure)?;
        let in_sample = fitted.predict_in_sample(level).map_err(fit_failure)?;
        let in_sample = Band::from_parts(
            in_sample.point,
            in_sample.intervals.map(|i| (i.lower, i.upper)),
            values.len(),
        )?;
        if horizon == 0 {
            return Ok((in_sample, Band::empty()));
        }
        let ahead = fitted.predict(horizon, level).map_err(fit_failure)?;
        let ahead = Band::from_parts(
            ahead.point,
            ahead.intervals.map(|i| (i.lower, i.upper)),
            horizon,
        )?;
        Ok((in_sample, ahead))
    }
}

fn fit_failure(err: impl Display) -> DetectorFitFailure {
    DetectorFitFailure::new(format!("revenue model: {err}"))
}
