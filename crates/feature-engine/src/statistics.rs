//! Statistical Features Computation

use serde::{Deserialize, Serialize};

/// Statistical features for a signal window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticalFeatures {
    /// Number of samples
    pub count: usize,
    /// Mean value
    pub mean: f64,
    /// Population variance
    pub variance: f64,
    /// Standard deviation
    pub std_dev: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Rate of change (mean absolute frame-to-frame delta)
    pub rate_of_change: f64,
}

impl StatisticalFeatures {
    /// Compute statistical features from a slice of values
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;

        let mean = values.iter().sum::<f64>() / n;

        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let max = values.iter().cloned().fold(f64::MIN, f64::max);

        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

        let rate_of_change = if values.len() >= 2 {
            let total_change: f64 = values.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
            total_change / (values.len() - 1) as f64
        } else {
            0.0
        };

        Self {
            count: values.len(),
            mean,
            variance,
            std_dev: variance.sqrt(),
            min,
            max,
            rate_of_change,
        }
    }
}

/// Population variance (divides by N), 0.0 for an empty slice
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mean_computation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let stats = StatisticalFeatures::compute(&values);
        assert!((stats.mean - 3.0).abs() < 0.001);
        assert_eq!(stats.count, 5);
    }

    #[test]
    fn test_std_dev_computation() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let stats = StatisticalFeatures::compute(&values);
        assert!((stats.std_dev - 2.0).abs() < 1e-9);
        assert!((stats.variance - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_max_and_rate() {
        let values = vec![0.30, 0.28, 0.31];
        let stats = StatisticalFeatures::compute(&values);
        assert!((stats.min - 0.28).abs() < 1e-9);
        assert!((stats.max - 0.31).abs() < 1e-9);
        assert!((stats.rate_of_change - 0.025).abs() < 1e-9);
    }

    #[test]
    fn test_empty_values() {
        let values: Vec<f64> = vec![];
        let stats = StatisticalFeatures::compute(&values);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(variance(&values), 0.0);
    }

    #[test]
    fn test_constant_signal_has_zero_variance() {
        assert_eq!(variance(&[0.25; 30]), 0.0);
    }

    proptest! {
        #[test]
        fn prop_variance_matches_features(values in proptest::collection::vec(0.0f64..1.0, 1..100)) {
            let stats = StatisticalFeatures::compute(&values);
            prop_assert!(stats.variance >= 0.0);
            prop_assert!((stats.variance - variance(&values)).abs() < 1e-12);
        }
    }
}
