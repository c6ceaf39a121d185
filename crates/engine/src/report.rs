//! Flag combiner and the assembled anomaly report.
//!
//! Every detector contributes one boolean column. The combiner ORs them into
//! `any_flag`, tallies each column, and keeps per-day provenance so a flagged
//! day always says which detectors fired.

use std::collections::HashMap;

use chrono::NaiveDate;
use salesops_core::{DailyOperations, ForecastPoint};
use salesops_detectors::Detector;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::{info, warn};

use crate::guard::DetectorStatus;

/// Forecast values joined onto a day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastBand {
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// One day of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRow {
    pub day: DailyOperations,
    flags: [bool; Detector::ALL.len()],
    pub any_flag: bool,
    pub forecast: Option<ForecastBand>,
}

impl AnomalyRow {
    #[must_use]
    pub const fn flag(&self, detector: Detector) -> bool {
        self.flags[detector.index()]
    }

    /// Detectors that fired on this day, in column order.
    #[must_use]
    pub fn fired(&self) -> Vec<Detector> {
        Detector::ALL
            .into_iter()
            .filter(|d| self.flag(*d))
            .collect()
    }
}

impl Serialize for AnomalyRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("date", &self.day.date)?;
        map.serialize_entry("revenue", &self.day.revenue)?;
        map.serialize_entry("profit", &self.day.profit)?;
        map.serialize_entry("cac", &self.day.cac)?;
        for detector in Detector::ALL {
            map.serialize_entry(detector.column(), &self.flag(detector))?;
        }
        map.serialize_entry("any_flag", &self.any_flag)?;
        if let Some(band) = &self.forecast {
            map.serialize_entry("predicted", &band.predicted)?;
            map.serialize_entry("lower", &band.lower)?;
            map.serialize_entry("upper", &band.upper)?;
        }
        map.end()
    }
}

/// Count of flagged days per detector, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorSummary {
    counts: [usize; Detector::ALL.len()],
}

impl DetectorSummary {
    #[must_use]
    pub const fn count(&self, detector: Detector) -> usize {
        self.counts[detector.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Detector, usize)> + '_ {
        Detector::ALL.into_iter().map(|d| (d, self.count(d)))
    }
}

impl Serialize for DetectorSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (detector, count) in self.iter() {
            map.serialize_entry(detector.column(), &count)?;
        }
        map.end()
    }
}

/// A flagged day together with the detectors responsible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedDay {
    pub date: NaiveDate,
    pub revenue: f64,
    pub profit: f64,
    pub cac: f64,
    pub detectors: Vec<Detector>,
}

/// Per-day flags from every detector, plus model statuses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    rows: Vec<AnomalyRow>,
    statuses: Vec<(Detector, DetectorStatus)>,
}

impl AnomalyReport {
    #[must_use]
    pub fn rows(&self) -> &[AnomalyRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The flag column of one detector.
    #[must_use]
    pub fn column(&self, detector: Detector) -> Vec<bool> {
        self.rows.iter().map(|r| r.flag(detector)).collect()
    }

    #[must_use]
    pub fn summary(&self) -> DetectorSummary {
        let mut counts = [0; Detector::ALL.len()];
        for row in &self.rows {
            for (count, flag) in counts.iter_mut().zip(row.flags) {
                *count += usize::from(flag);
            }
        }
        DetectorSummary { counts }
    }

    /// Days with any flag, newest first.
    #[must_use]
    pub fn flagged(&self) -> Vec<FlaggedDay> {
        let mut days: Vec<FlaggedDay> = self
            .rows
            .iter()
            .filter(|r| r.any_flag)
            .map(|r| FlaggedDay {
                date: r.day.date,
                revenue: r.day.revenue,
                profit: r.day.profit,
                cac: r.day.cac,
                detectors: r.fired(),
            })
            .collect();
        days.sort_by(|a, b| b.date.cmp(&a.date));
        days
    }

    /// Status of a model-based detector; robust statistics are always `Ok`.
    #[must_use]
    pub fn status(&self, detector: Detector) -> &DetectorStatus {
        self.statuses
            .iter()
            .find(|(d, _)| *d == detector)
            .map_or(&DetectorStatus::Ok, |(_, s)| s)
    }

    /// Detectors that degraded, with their reasons.
    pub fn degraded(&self) -> impl Iterator<Item = (Detector, &str)> {
        self.statuses.iter().filter_map(|(d, s)| match s {
            DetectorStatus::Ok => None,
            DetectorStatus::Failed { reason } => Some((*d, reason.as_str())),
        })
    }

    /// True when the forecast succeeded and its bands are joined in.
    #[must_use]
    pub fn has_forecast(&self) -> bool {
        self.rows.iter().any(|r| r.forecast.is_some())
    }

    /// Export header: day fields, flag columns, `any_flag`, then the bands if present.
    #[must_use]
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["date", "revenue", "profit", "cac"];
        columns.extend(Detector::ALL.iter().map(Detector::column));
        columns.push("any_flag");
        if self.has_forecast() {
            columns.extend(["predicted", "lower", "upper"]);
        }
        columns
    }

    /// Rows as strings, matching [`AnomalyReport::columns`].
    #[must_use]
    pub fn to_records(&self) -> Vec<Vec<String>> {
        let with_forecast = self.has_forecast();
        self.rows
            .iter()
            .map(|row| {
                let mut record = vec![
                    row.day.date.to_string(),
                    row.day.revenue.to_string(),
                    row.day.profit.to_string(),
                    row.day.cac.to_string(),
                ];
                record.extend(row.flags.iter().map(ToString::to_string));
                record.push(row.any_flag.to_string());
                if with_forecast {
                    match &row.forecast {
                        Some(band) => record.extend([
                            band.predicted.to_string(),
                            band.lower.to_string(),
                            band.upper.to_string(),
                        ]),
                        None => record.extend([String::new(), String::new(), String::new()]),
                    }
                }
                record
            })
            .collect()
    }
}

/// Collects detector columns over one daily frame and assembles the report.
pub struct FlagCombiner {
    days: Vec<DailyOperations>,
    columns: [Option<Vec<bool>>; Detector::ALL.len()],
    forecast: Vec<ForecastPoint>,
    statuses: Vec<(Detector, DetectorStatus)>,
}

impl FlagCombiner {
    #[must_use]
    pub fn new(days: Vec<DailyOperations>) -> Self {
        Self {
            days,
            columns: Default::default(),
            forecast: Vec::new(),
            statuses: Vec::new(),
        }
    }

    /// Adds a detector's column. A column of the wrong length is replaced by
    /// all-`false`.
    #[must_use]
    pub fn with_flags(mut self, detector: Detector, flags: Vec<bool>) -> Self {
        let flags = if flags.len() == self.days.len() {
            flags
        } else {
            warn!(
                detector = %detector,
                expected = self.days.len(),
                got = flags.len(),
                "flag column length mismatch"
            );
            vec![false; self.days.len()]
        };
        self.columns[detector.index()] = Some(flags);
        self
    }

    /// Joins forecast bands by date; days without a point get none.
    #[must_use]
    pub fn with_forecast(mut self, points: Vec<ForecastPoint>) -> Self {
        self.forecast = points;
        self
    }

    #[must_use]
    pub fn with_status(mut self, detector: Detector, status: DetectorStatus) -> Self {
        self.statuses.retain(|(d, _)| *d != detector);
        self.statuses.push((detector, status));
        self
    }

    /// Builds the report. Missing columns count as all-`false`.
    #[must_use]
    pub fn assemble(self) -> AnomalyReport {
        let bands: HashMap<NaiveDate, ForecastBand> = self
            .forecast
            .iter()
            .map(|p| {
                (
                    p.date,
                    ForecastBand {
                        predicted: p.predicted,
                        lower: p.lower,
                        upper: p.upper,
                    },
                )
            })
            .collect();

        let rows: Vec<AnomalyRow> = self
            .days
            .into_iter()
            .enumerate()
            .map(|(i, day)| {
                let mut flags = [false; Detector::ALL.len()];
                for (flag, column) in flags.iter_mut().zip(&self.columns) {
                    *flag = column.as_ref().is_some_and(|c| c[i]);
                }
                AnomalyRow {
                    any_flag: flags.iter().any(|f| *f),
                    forecast: bands.get(&day.date).copied(),
                    day,
                    flags,
                }
            })
            .collect();

        let report = AnomalyReport {
            rows,
            statuses: self.statuses,
        };
        info!(
            days = report.len(),
            flagged = report.rows.iter().filter(|r| r.any_flag).count(),
            "anomaly report assembled"
        );
        report
    }
}
