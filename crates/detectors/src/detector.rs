//! Identity of each flag column in the anomaly report.

use salesops_core::Metric;
use serde::{Serialize, Serializer};
use std::fmt;

/// One detector instance, i.e. one boolean column of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    /// Multivariate outlier model over revenue, profit and CAC jointly.
    IsolationForest,
    /// Population z-score on a single metric.
    ZScore(Metric),
    /// MAD-based modified z-score on a single metric.
    Mad(Metric),
    /// Revenue outside the seasonal forecast's predictive interval.
    ForecastInterval,
}

/// Broad family, used to group suggested follow-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorFamily {
    Multivariate,
    Univariate,
    Robust,
    Seasonal,
}

impl Detector {
    /// Every detector in report column order.
    pub const ALL: [Self; 8] = [
        Self::IsolationForest,
        Self::ZScore(Metric::Revenue),
        Self::ZScore(Metric::Profit),
        Self::ZScore(Metric::Cac),
        Self::Mad(Metric::Revenue),
        Self::Mad(Metric::Profit),
        Self::Mad(Metric::Cac),
        Self::ForecastInterval,
    ];

    /// Stable column identifier used in exports.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::IsolationForest => "flagIso",
            Self::ZScore(Metric::Revenue) => "flagZRevenue",
            Self::ZScore(Metric::Profit) => "flagZProfit",
            Self::ZScore(Metric::Cac) => "flagZCac",
            Self::Mad(Metric::Revenue) => "flagMadRevenue",
            Self::Mad(Metric::Profit) => "flagMadProfit",
            Self::Mad(Metric::Cac) => "flagMadCac",
            Self::ForecastInterval => "flagProphet",
        }
    }

    /// Display label for tables.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::IsolationForest => "Isolation Forest Flag",
            Self::ZScore(Metric::Revenue) => "Z-Score Revenue Flag",
            Self::ZScore(Metric::Profit) => "Z-Score Profit Flag",
            Self::ZScore(Metric::Cac) => "Z-Score CAC Flag",
            Self::Mad(Metric::Revenue) => "MAD Revenue Flag",
            Self::Mad(Metric::Profit) => "MAD Profit Flag",
            Self::Mad(Metric::Cac) => "MAD CAC Flag",
            Self::ForecastInterval => "Forecast Interval Flag",
        }
    }

    #[must_use]
    pub const fn family(&self) -> DetectorFamily {
        match self {
            Self::IsolationForest => DetectorFamily::Multivariate,
            Self::ZScore(_) => DetectorFamily::Univariate,
            Self::Mad(_) => DetectorFamily::Robust,
            Self::ForecastInterval => DetectorFamily::Seasonal,
        }
    }

    /// Position in [`Detector::ALL`].
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::IsolationForest => 0,
            Self::ZScore(Metric::Revenue) => 1,
            Self::ZScore(Metric::Profit) => 2,
            Self::ZScore(Metric::Cac) => 3,
            Self::Mad(Metric::Revenue) => 4,
            Self::Mad(Metric::Profit) => 5,
            Self::Mad(Metric::Cac) => 6,
            Self::ForecastInterval => 7,
        }
    }

    /// Looks a detector up by its column identifier.
    #[must_use]
    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.column() == column)
    }
}

impl DetectorFamily {
    /// What an operator should look at when this family fires.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Multivariate => "multivariate oddity: revenue, margin and marketing spend moved together unusually",
            Self::Univariate => "single-metric spike relative to the window mean",
            Self::Robust => "outlier even under heavy tails; robust to the spike itself",
            Self::Seasonal => "break from trend or weekly pattern: structural change or campaign",
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl Serialize for Detector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.column())
    }
}
