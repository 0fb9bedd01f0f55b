//! Field quality statistics
//!
//! Null and cardinality ratios for every field, distribution statistics for
//! numeric fields. Numeric statistics describe the sampled values only.
//! Percentiles interpolate linearly between the closest ranks
//! (`rank = q * (n - 1)` over the sorted sample), so `p50` is the median;
//! `std_dev` is the sample standard deviation.

use serde::{Deserialize, Serialize};

use crate::inference::DataType;

/// Distribution of a numeric field's sampled values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    /// Values the statistics were computed over
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    /// 0-100
    pub null_percentage: f64,
    pub distinct_count: u64,
    /// Distinct values per observation, 0-1
    pub cardinality_ratio: f64,
    /// Present for numeric fields with at least two sampled values
    pub numeric: Option<NumericStats>,
}

/// Compute quality statistics for one field
pub fn compute_stats(
    data_type: DataType,
    total_count: u64,
    null_count: u64,
    distinct_count: u64,
    numeric_values: &[f64],
) -> QualityStats {
    let (null_percentage, cardinality_ratio) = if total_count == 0 {
        (0.0, 0.0)
    } else {
        let total = total_count as f64;
        (
            (null_count as f64 / total * 100.0).clamp(0.0, 100.0),
            (distinct_count as f64 / total).clamp(0.0, 1.0),
        )
    };

    let numeric = if data_type.is_numeric() {
        numeric_stats(numeric_values)
    } else {
        None
    };

    QualityStats {
        null_percentage,
        distinct_count,
        cardinality_ratio,
        numeric,
    }
}

/// Distribution statistics, or `None` below two finite values
///
/// Mean and variance are accumulated over values scaled by the largest
/// magnitude, so sums of large finite values cannot overflow. Any statistic
/// that still ends up non-finite drops the whole distribution.
pub fn numeric_stats(values: &[f64]) -> Option<NumericStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.len() < 2 {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let scale = min.abs().max(max.abs());
    let (mean, std_dev) = if scale == 0.0 {
        (0.0, 0.0)
    } else {
        let (mean, variance) = welford(sorted.iter().map(|v| v / scale));
        (mean * scale, variance.sqrt() * scale)
    };
    let p50 = percentile(&sorted, 0.50);

    let stats = NumericStats {
        min,
        max,
        mean,
        median: p50,
        std_dev,
        p25: percentile(&sorted, 0.25),
        p50,
        p75: percentile(&sorted, 0.75),
        sample_size: sorted.len(),
    };
    stats.is_finite().then_some(stats)
}

impl NumericStats {
    fn is_finite(&self) -> bool {
        [self.min, self.max, self.mean, self.median, self.std_dev, self.p25, self.p50, self.p75]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Running mean and sample variance
fn welford(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut count = 0.0;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for value in values {
        count += 1.0;
        let delta = value - mean;
        mean += delta / count;
        m2 += delta * (value - mean);
    }
    let variance = if count > 1.0 { m2 / (count - 1.0) } else { 0.0 };
    (mean, variance)
}

/// Linear interpolation between closest ranks over sorted, non-empty input
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}
