//! Summary statistics over per-image metrics.

use serde::{Deserialize, Serialize};

/// Summary of one metric across a batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    /// Number of finite values
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Median (mean of the middle pair for even counts)
    pub median: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Sample standard deviation (0 for a single value)
    pub stddev: f64,
}

impl MetricStatistics {
    /// Summarize the finite values; `None` when there are none
    #[must_use]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        finite.sort_by(f64::total_cmp);

        let count = finite.len();
        let n = count as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let median = if count % 2 == 1 {
            finite[count / 2]
        } else {
            (finite[count / 2 - 1] + finite[count / 2]) / 2.0
        };
        let stddev = if count > 1 {
            let ss: f64 = finite.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(Self {
            count,
            mean,
            median,
            min: finite[0],
            max: finite[count - 1],
            stddev,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_statistics() {
        let stats = MetricStatistics::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.median - 4.5).abs() < 1e-12);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        // Sample stddev: sqrt(32 / 7)
        assert!((stats.stddev - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_odd_median() {
        let stats = MetricStatistics::from_values(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!(stats.median, 2.0);
    }

    #[test]
    fn test_single_value() {
        let stats = MetricStatistics::from_values(&[0.7]).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.stddev, 0.0);
        assert_eq!(stats.median, 0.7);
    }

    #[test]
    fn test_non_finite_excluded() {
        let stats = MetricStatistics::from_values(&[1.0, f64::INFINITY, f64::NAN, 3.0]).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, 2.0);
    }

    #[test]
    fn test_empty() {
        assert!(MetricStatistics::from_values(&[]).is_none());
        assert!(MetricStatistics::from_values(&[f64::INFINITY]).is_none());
    }
}
