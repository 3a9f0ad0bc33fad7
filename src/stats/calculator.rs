//! Statistics Calculator Module
//! Descriptive statistics for impact scores and confidence intervals for proportions.

use polars::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// Confidence level of the proportion intervals.
pub const CONFIDENCE_LEVEL: f64 = 0.95;

/// Clinical impact statistics for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub p05: f64,
    pub p95: f64,
}

impl Default for ImpactStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            p05: f64::NAN,
            p95: f64::NAN,
        }
    }
}

/// Handles statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> ImpactStats {
        let n = values.len();
        if n == 0 {
            return ImpactStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = values.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        let variance = if n > 1 {
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        ImpactStats {
            count: n,
            mean,
            median,
            std: variance.sqrt(),
            p05: Self::percentile(&sorted, 5.0),
            p95: Self::percentile(&sorted, 95.0),
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Two-sided critical value of the standard normal for a confidence level.
    pub fn z_score(level: f64) -> f64 {
        Normal::new(0.0, 1.0)
            .map(|dist| dist.inverse_cdf(0.5 + level / 2.0))
            .unwrap_or(1.959_963_984_540_054)
    }

    /// Wilson score interval for `successes` out of `trials`.
    pub fn wilson_interval(successes: usize, trials: usize, z: f64) -> (f64, f64) {
        if trials == 0 {
            return (0.0, 0.0);
        }
        let n = trials as f64;
        let p = successes as f64 / n;
        let z2 = z * z;

        let denom = 1.0 + z2 / n;
        let center = (p + z2 / (2.0 * n)) / denom;
        let half = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denom;

        ((center - half).max(0.0), (center + half).min(1.0))
    }

    /// Get impact values for a specific category from DataFrame.
    pub fn get_values_for_category(df: &DataFrame, category: &str) -> Vec<f64> {
        df.clone()
            .lazy()
            .filter(col("category").eq(lit(category)))
            .select([col("impact")])
            .collect()
            .ok()
            .and_then(|df| df.column("impact").ok().cloned())
            .map(|col| {
                col.f64()
                    .ok()
                    .map(|ca| ca.into_iter().flatten().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}
