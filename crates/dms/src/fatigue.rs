//! Long-horizon fatigue inference from blink frequency and EAR variance

use feature_engine::variance;
use ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};

use crate::DmsConfig;

/// Result of a fatigue query
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FatigueAssessment {
    /// Blinks per second over the session
    pub blink_frequency: f64,
    /// EAR variance over the trailing window (0 until the window is full)
    pub ear_variance: f64,
    /// Whether either fatigue rule fired
    pub fatigued: bool,
}

/// Stateless fatigue estimator
#[derive(Debug, Clone)]
pub struct FatigueEstimator {
    blink_frequency_threshold: f64,
    variance_threshold: f64,
    variance_window: usize,
    min_samples: usize,
}

impl FatigueEstimator {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            blink_frequency_threshold: config.blink_frequency_threshold,
            variance_threshold: config.variance_threshold,
            variance_window: config.variance_window,
            min_samples: config.variance_min_samples,
        }
    }

    /// Trailing-window EAR variance, 0.0 while fewer than `variance_window` samples exist
    pub fn ear_variance(&self, history: &RingBuffer<f64>) -> f64 {
        if history.len() < self.variance_window {
            return 0.0;
        }
        variance(&history.trailing(self.variance_window))
    }

    /// Blink frequency (blinks per second); 0.0 for an empty session
    pub fn blink_frequency(total_blinks: u32, session_secs: f64) -> f64 {
        if session_secs > 0.0 {
            f64::from(total_blinks) / session_secs
        } else {
            0.0
        }
    }

    /// Frequent blinking or an unusually steady gaze both indicate fatigue
    pub fn assess(
        &self,
        total_blinks: u32,
        session_secs: f64,
        history: &RingBuffer<f64>,
    ) -> FatigueAssessment {
        let blink_frequency = Self::blink_frequency(total_blinks, session_secs);
        let ear_variance = self.ear_variance(history);

        let frequent_blinks = blink_frequency > self.blink_frequency_threshold;
        let fixed_gaze =
            ear_variance < self.variance_threshold && history.len() >= self.min_samples;

        FatigueAssessment {
            blink_frequency,
            ear_variance,
            fatigued: frequent_blinks || fixed_gaze,
        }
    }

    pub fn is_fatigued(
        &self,
        total_blinks: u32,
        session_secs: f64,
        history: &RingBuffer<f64>,
    ) -> bool {
        self.assess(total_blinks, session_secs, history).fatigued
    }
}

impl Default for FatigueEstimator {
    fn default() -> Self {
        Self::new(&DmsConfig::default())
    }
}
