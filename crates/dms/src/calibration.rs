//! Personal eye-closure threshold calibration

use feature_engine::StatisticalFeatures;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::DmsConfig;

/// Progress of a calibration session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CalibrationStatus {
    /// Still collecting open-eye samples
    InProgress { collected: usize, required: usize },
    /// Threshold derived from the collected samples
    Complete { threshold: f64 },
}

impl CalibrationStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, CalibrationStatus::Complete { .. })
    }
}

/// Collects open-eye EAR samples and derives a personalised threshold
#[derive(Debug, Clone)]
pub struct Calibrator {
    samples: Vec<f64>,
    required: usize,
    factor: f64,
    threshold: Option<f64>,
}

impl Calibrator {
    /// Create a calibrator requiring `required` samples; threshold is `mean * factor`
    pub fn new(required: usize, factor: f64) -> Self {
        let required = required.max(1);
        Self {
            samples: Vec::with_capacity(required),
            required,
            factor,
            threshold: None,
        }
    }

    pub fn from_config(config: &DmsConfig) -> Self {
        Self::new(config.calibration_samples, config.calibration_factor)
    }

    /// Add one open-eye sample.
    ///
    /// Completes on the `required`-th sample. Calls after completion leave
    /// the session untouched and keep reporting the same threshold.
    pub fn add_sample(&mut self, ear: f64) -> CalibrationStatus {
        if let Some(threshold) = self.threshold {
            return CalibrationStatus::Complete { threshold };
        }

        self.samples.push(ear);
        if self.samples.len() < self.required {
            return CalibrationStatus::InProgress {
                collected: self.samples.len(),
                required: self.required,
            };
        }

        let summary = StatisticalFeatures::compute(&self.samples);
        let threshold = summary.mean * self.factor;
        info!(
            "Calibration complete: EAR threshold = {:.3} (mean {:.3}, std {:.3}, n={})",
            threshold, summary.mean, summary.std_dev, summary.count
        );
        self.threshold = Some(threshold);
        CalibrationStatus::Complete { threshold }
    }

    /// Discard all samples and any derived threshold
    pub fn reset(&mut self) {
        debug!("Calibration reset ({} samples discarded)", self.samples.len());
        self.samples.clear();
        self.threshold = None;
    }

    pub fn status(&self) -> CalibrationStatus {
        match self.threshold {
            Some(threshold) => CalibrationStatus::Complete { threshold },
            None => CalibrationStatus::InProgress {
                collected: self.samples.len(),
                required: self.required,
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        self.threshold.is_some()
    }

    /// Derived threshold, once complete
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn required(&self) -> usize {
        self.required
    }

    /// Completion percentage (0.0 to 100.0)
    pub fn progress_percent(&self) -> f64 {
        self.samples.len() as f64 * 100.0 / self.required as f64
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::from_config(&DmsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completes_on_hundredth_sample() {
        let mut calibrator = Calibrator::default();
        let samples: Vec<f64> = (0..100).map(|i| 0.25 + (i % 10) as f64 * 0.01).collect();

        for (i, &ear) in samples.iter().enumerate() {
            let status = calibrator.add_sample(ear);
            if i < 99 {
                assert_eq!(
                    status,
                    CalibrationStatus::InProgress {
                        collected: i + 1,
                        required: 100
                    }
                );
            } else {
                assert!(status.is_complete());
            }
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let threshold = calibrator.threshold().unwrap();
        assert!((threshold - 0.8 * mean).abs() < 1e-9);
    }

    #[test]
    fn test_sample_after_completion_is_noop() {
        let mut calibrator = Calibrator::new(100, 0.8);
        for _ in 0..100 {
            calibrator.add_sample(0.3);
        }
        let threshold = calibrator.threshold().unwrap();

        let status = calibrator.add_sample(0.9);
        assert_eq!(status, CalibrationStatus::Complete { threshold });
        assert_eq!(calibrator.sample_count(), 100);
        assert_eq!(calibrator.threshold(), Some(threshold));
    }

    #[test]
    fn test_reset_discards_samples() {
        let mut calibrator = Calibrator::new(10, 0.8);
        for _ in 0..7 {
            calibrator.add_sample(0.5);
        }
        calibrator.reset();
        assert_eq!(calibrator.sample_count(), 0);
        assert!(!calibrator.is_complete());

        for _ in 0..10 {
            calibrator.add_sample(0.25);
        }
        // Old 0.5 samples must not leak into the new threshold
        assert!((calibrator.threshold().unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_reset_after_completion_restarts() {
        let mut calibrator = Calibrator::new(2, 0.8);
        calibrator.add_sample(0.3);
        calibrator.add_sample(0.3);
        assert!(calibrator.is_complete());

        calibrator.reset();
        assert_eq!(
            calibrator.status(),
            CalibrationStatus::InProgress {
                collected: 0,
                required: 2
            }
        );
        assert_eq!(calibrator.threshold(), None);
    }

    #[test]
    fn test_progress_percent() {
        let mut calibrator = Calibrator::new(100, 0.8);
        for _ in 0..25 {
            calibrator.add_sample(0.3);
        }
        assert!((calibrator.progress_percent() - 25.0).abs() < 1e-9);
    }
}
