//! Degradation policy for model-based detectors.
//!
//! A model fit runs on the blocking pool under a deadline. Whatever goes
//! wrong (a returned failure, a panic, the deadline) becomes a
//! [`DetectorFitFailure`], and [`degrade`] turns that into an all-`false`
//! column plus a [`DetectorStatus::Failed`] the report carries along.

use std::time::Duration;

use salesops_core::DetectorFitFailure;
use salesops_detectors::Detector;
use serde::Serialize;
use tracing::warn;

/// Outcome of one model-based detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectorStatus {
    Ok,
    Failed { reason: String },
}

impl DetectorStatus {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Runs `fit` on the blocking pool and waits at most `deadline` for it.
///
/// On timeout the blocking task is detached, not aborted; its result is
/// discarded when it eventually finishes. A runtime that owns such a task
/// must be shut down with `shutdown_timeout` or `shutdown_background`, since
/// dropping it waits for every blocking thread.
pub async fn guarded_fit<T, F>(deadline: Duration, fit: F) -> Result<T, DetectorFitFailure>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DetectorFitFailure> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(fit);
    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) if join_error.is_panic() => {
            Err(DetectorFitFailure::new("model fit panicked"))
        }
        Ok(Err(_)) => Err(DetectorFitFailure::new("model fit was cancelled")),
        Err(_) => Err(DetectorFitFailure::new(format!(
            "model fit exceeded {} ms",
            deadline.as_millis()
        ))),
    }
}

/// Unwraps a detector outcome, substituting `len` `false` flags on failure.
pub fn degrade(
    detector: Detector,
    outcome: Result<Vec<bool>, DetectorFitFailure>,
    len: usize,
) -> (Vec<bool>, DetectorStatus) {
    match outcome {
        Ok(flags) if flags.len() == len => (flags, DetectorStatus::Ok),
        Ok(flags) => {
            let reason = format!("expected {len} flags, got {}", flags.len());
            warn!(detector = %detector, %reason, "detector output misaligned, using all-false");
            (vec![false; len], DetectorStatus::Failed { reason })
        }
        Err(failure) => {
            warn!(detector = %detector, reason = %failure.reason, "detector degraded to all-false");
            (
                vec![false; len],
                DetectorStatus::Failed {
                    reason: failure.reason,
                },
            )
        }
    }
}
