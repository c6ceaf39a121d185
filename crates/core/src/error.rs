//! Error taxonomy for the anomaly engine.
//!
//! Only [`AnomalyError`] ever reaches a caller. Model fit problems are
//! reported as [`DetectorFitFailure`] and absorbed by the engine.

use thiserror::Error;

/// Errors surfaced to callers of the anomaly pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnomalyError {
    /// No transactions were supplied.
    #[error("no transactions supplied")]
    EmptyInput,

    /// Too few aggregated days for the detectors to be meaningful.
    #[error("insufficient history: {days} day(s) aggregated, at least {required} required")]
    InsufficientHistory {
        /// Distinct days present after aggregation.
        days: usize,
        /// Configured minimum.
        required: usize,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnomalyError {
    /// Returns true for errors that abort the call.
    ///
    /// `InsufficientHistory` is an expected state shown to the user as a
    /// status, not a failure.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::InsufficientHistory { .. })
    }

    /// Human-readable status line for the presentation layer.
    #[must_use]
    pub fn status_message(&self) -> String {
        match self {
            Self::InsufficientHistory { days, required } => format!(
                "Not enough daily history for anomaly detection (need >= {required} days, have {days})."
            ),
            other => other.to_string(),
        }
    }
}

/// A single detector could not produce flags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("detector fit failed: {reason}")]
pub struct DetectorFitFailure {
    pub reason: String,
}

impl DetectorFitFailure {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
