//! Isolation Forest over the joint daily metrics.
//!
//! Each tree recursively partitions a random subsample with random
//! axis-aligned cuts. Points that end up isolated after few cuts are
//! anomalous. The anomaly score of a point is `2^(-E[h(x)] / c(psi))` where
//! `E[h(x)]` is its mean path length across trees and `c(psi)` the expected
//! path length of an unsuccessful binary-search-tree lookup over `psi` points.
//!
//! The decision threshold is the `(1 - contamination)` percentile of the
//! training scores, so roughly `contamination * n` days are flagged.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use salesops_core::stats::percentile;
use salesops_core::{DailyOperations, DetectorFitFailure, IsolationConfig, Metric};
use tracing::debug;

/// Default subsample size per tree when none is configured.
pub const DEFAULT_MAX_SAMPLES: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn path_length(&self, row: &[f64], depth: usize) -> f64 {
        match self {
            Self::Leaf { size } => depth as f64 + average_path_length(*size),
            Self::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.path_length(row, depth + 1)
                } else {
                    right.path_length(row, depth + 1)
                }
            }
        }
    }
}

/// A fitted forest with its decision threshold.
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    n_features: usize,
    threshold: f64,
}

impl IsolationForest {
    /// Fits the forest on `rows` and derives the contamination threshold.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorFitFailure`] when there are fewer than 2 rows, the
    /// per-tree subsample is smaller than 2, `n_estimators` is zero, the
    /// contamination rate is outside `(0, 0.5]`, rows are ragged, or any
    /// value is non-finite.
    pub fn fit(rows: &[Vec<f64>], config: &IsolationConfig) -> Result<Self, DetectorFitFailure> {
        let n = rows.len();
        if n < 2 {
            return Err(DetectorFitFailure::new(format!(
                "isolation forest needs at least 2 samples, got {n}"
            )));
        }
        if config.n_estimators == 0 {
            return Err(DetectorFitFailure::new("n_estimators must be positive"));
        }
        if !(config.contamination > 0.0 && config.contamination <= 0.5) {
            return Err(DetectorFitFailure::new(format!(
                "contamination must be in (0, 0.5], got {}",
                config.contamination
            )));
        }

        let n_features = rows[0].len();
        if n_features == 0 || rows.iter().any(|r| r.len() != n_features) {
            return Err(DetectorFitFailure::new("rows must share a non-zero width"));
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(DetectorFitFailure::new("input contains non-finite values"));
        }

        let sample_size = config.max_samples.unwrap_or(DEFAULT_MAX_SAMPLES).min(n);
        if sample_size < 2 {
            return Err(DetectorFitFailure::new(format!(
                "each tree needs at least 2 samples, got {sample_size}"
            )));
        }
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let trees: Vec<Node> = (0..config.n_estimators)
            .map(|_| {
                let sample = index::sample(&mut rng, n, sample_size).into_vec();
                build_tree(rows, sample, 0, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            n_features,
            threshold: f64::INFINITY,
        };

        let scores = forest.score_samples(rows);
        forest.threshold = percentile(&scores, 1.0 - config.contamination)
            .ok_or_else(|| DetectorFitFailure::new("no scores to threshold"))?;

        debug!(
            trees = forest.trees.len(),
            sample_size,
            height_limit,
            threshold = forest.threshold,
            "isolation forest fitted"
        );

        Ok(forest)
    }

    /// Anomaly score in `(0, 1]`; higher is more anomalous.
    #[must_use]
    pub fn score(&self, row: &[f64]) -> f64 {
        debug_assert_eq!(row.len(), self.n_features);
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let normaliser = average_path_length(self.sample_size);
        2f64.powf(-mean_path / normaliser)
    }

    #[must_use]
    pub fn score_samples(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.score(r)).collect()
    }

    /// Score above which a row is an outlier.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[must_use]
    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<bool> {
        rows.iter().map(|r| self.score(r) > self.threshold).collect()
    }

    /// Fits on `rows` and flags them in one step.
    ///
    /// # Errors
    ///
    /// See [`IsolationForest::fit`].
    pub fn fit_predict(
        rows: &[Vec<f64>],
        config: &IsolationConfig,
    ) -> Result<Vec<bool>, DetectorFitFailure> {
        Ok(Self::fit(rows, config)?.predict(rows))
    }
}

/// Builds the `[revenue, profit, cac]` matrix, treating missing values as zero.
#[must_use]
pub fn daily_features(days: &[DailyOperations]) -> Vec<Vec<f64>> {
    days.iter()
        .map(|day| {
            Metric::ALL
                .iter()
                .map(|m| {
                    let v = m.value(day);
                    if v.is_finite() {
                        v
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

fn build_tree(
    rows: &[Vec<f64>],
    sample: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut ChaCha8Rng,
) -> Node {
    if depth >= height_limit || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    // only features with spread can split this node
    let candidates: Vec<(usize, f64, f64)> = (0..rows[sample[0]].len())
        .filter_map(|feature| {
            let (lo, hi) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                let v = rows[i][feature];
                (lo.min(v), hi.max(v))
            });
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf { size: sample.len() };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        sample.into_iter().partition(|&i| rows[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(rows, left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(rows, right, depth + 1, height_limit, rng)),
    }
}

/// Expected path length `c(n)` of an unsuccessful search in a BST of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A tight cluster on a deterministic lattice plus one far-off day.
    fn clustered_with_outlier() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let j = f64::from(i % 5) - 2.0;
                let k = f64::from(i % 7) - 3.0;
                vec![1000.0 + 10.0 * j, 20.0 + k, 35.0 + 0.5 * j]
            })
            .collect();
        rows.push(vec![4000.0, -60.0, 140.0]);
        rows
    }

    // ============================================
    // Path length normaliser
    // ============================================

    #[test]
    fn average_path_length_small_cases() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) is about 10.24
        let c = average_path_length(256);
        assert!((c - 10.24).abs() < 0.01, "c was {c}");
    }

    // ============================================
    // Fitting
    // ============================================

    #[test]
    fn flags_the_isolated_point() {
        let rows = clustered_with_outlier();
        let forest = IsolationForest::fit(&rows, &IsolationConfig::default()).unwrap();
        let flags = forest.predict(&rows);

        assert!(flags[40], "outlier should be flagged");
        let flagged = flags.iter().filter(|f| **f).count();
        // 6% of 41 rows: the interpolated 94th percentile leaves at most 3 above it
        assert!(flagged <= 3, "flagged {flagged}");

        let scores = forest.score_samples(&rows);
        let max_inlier = scores[..40].iter().copied().fold(f64::MIN, f64::max);
        assert!(scores[40] > max_inlier);
    }

    #[test]
    fn same_seed_same_flags() {
        let rows = clustered_with_outlier();
        let config = IsolationConfig::default();
        let a = IsolationForest::fit_predict(&rows, &config).unwrap();
        let b = IsolationForest::fit_predict(&rows, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn identical_rows_flag_nothing() {
        let rows = vec![vec![5.0, 5.0, 5.0]; 20];
        let flags = IsolationForest::fit_predict(&rows, &IsolationConfig::default()).unwrap();
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn scores_are_in_unit_interval() {
        let rows = clustered_with_outlier();
        let forest = IsolationForest::fit(&rows, &IsolationConfig::default()).unwrap();
        for s in forest.score_samples(&rows) {
            assert!(s > 0.0 && s <= 1.0, "score {s}");
        }
    }

    // ============================================
    // Fit failures
    // ============================================

    #[test]
    fn single_row_fails() {
        let rows = vec![vec![1.0, 2.0, 3.0]];
        assert!(IsolationForest::fit(&rows, &IsolationConfig::default()).is_err());
    }

    #[test]
    fn subsample_of_one_fails() {
        let rows = clustered_with_outlier();
        let config = IsolationConfig {
            max_samples: Some(1),
            ..IsolationConfig::default()
        };
        let err = IsolationForest::fit(&rows, &config).err().unwrap();
        assert!(err.reason.contains("at least 2"), "reason was {}", err.reason);
    }

    #[test]
    fn zero_trees_fails() {
        let config = IsolationConfig {
            n_estimators: 0,
            ..IsolationConfig::default()
        };
        assert!(IsolationForest::fit(&clustered_with_outlier(), &config).is_err());
    }

    #[test]
    fn non_finite_input_fails() {
        let mut rows = clustered_with_outlier();
        rows[3][1] = f64::NAN;
        assert!(IsolationForest::fit(&rows, &IsolationConfig::default()).is_err());
    }

    #[test]
    fn daily_features_zero_fill_missing() {
        let day = DailyOperations {
            date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            revenue: 10.0,
            profit: f64::NAN,
            cac: 2.0,
        };
        assert_eq!(daily_features(&[day]), vec![vec![10.0, 0.0, 2.0]]);
    }
}
