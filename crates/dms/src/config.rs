//! DMS configuration
//!
//! Frame-count thresholds (`*_frames`) depend on the camera frame rate: the
//! defaults assume roughly 30fps. Time thresholds (`*_secs`) are wall-clock.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Eye-opening ratio below which eyes count as closed (replaced by calibration)
    pub ear_threshold: f64,

    /// Mouth-opening ratio above which the mouth counts as open
    pub mar_threshold: f64,

    /// Consecutive closed-eye frames before the subject is considered asleep
    pub sleep_frames: u32,

    /// Minimum closed-eye frames for a blink to count
    pub blink_min_frames: u32,

    /// Minimum gap between two counted blinks (seconds)
    pub blink_min_gap_secs: f64,

    /// Open-mouth frames before a yawn raises the drowsy mode
    pub yawn_frames: u32,

    /// Frames without a face before the subject is considered distracted
    pub no_face_frames: u32,

    /// Closed-eye frames before the eye-fatigue alert activates
    pub eye_fatigue_frames: u32,

    /// Minimum lifetime of the eye-fatigue alert (seconds)
    pub eye_fatigue_alert_secs: f64,

    /// Samples collected during calibration
    pub calibration_samples: usize,

    /// Fraction of the calibrated open-eye mean used as threshold
    pub calibration_factor: f64,

    /// EAR history capacity
    pub history_capacity: usize,

    /// Trailing window for EAR variance
    pub variance_window: usize,

    /// EAR variance below which the gaze is considered fixed (fatigue)
    pub variance_threshold: f64,

    /// Blinks per second above which the subject is considered tired
    pub blink_frequency_threshold: f64,

    /// History samples required before the variance rule applies
    pub variance_min_samples: usize,

    /// Session uptime before the fatigue estimator is consulted (seconds)
    pub fatigue_warmup_secs: f64,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.2,
            mar_threshold: 0.5,
            sleep_frames: 40,
            blink_min_frames: 3,
            blink_min_gap_secs: 0.5,
            yawn_frames: 20,
            no_face_frames: 60,
            eye_fatigue_frames: 20,
            eye_fatigue_alert_secs: 5.0,
            calibration_samples: 100,
            calibration_factor: 0.8,
            history_capacity: ring_buffer::DEFAULT_CAPACITY,
            variance_window: 30,
            variance_threshold: 0.001,
            blink_frequency_threshold: 0.5,
            variance_min_samples: 100,
            fatigue_warmup_secs: 30.0,
        }
    }
}

impl DmsConfig {
    /// Create strict config (alerts sooner)
    pub fn strict() -> Self {
        Self {
            sleep_frames: 30,
            yawn_frames: 15,
            no_face_frames: 45,
            eye_fatigue_frames: 15,
            ..Default::default()
        }
    }

    /// Create lenient config (alerts later)
    pub fn lenient() -> Self {
        Self {
            sleep_frames: 60,
            yawn_frames: 30,
            no_face_frames: 90,
            eye_fatigue_frames: 30,
            ..Default::default()
        }
    }

    /// Load configuration from defaults, an optional file, then `DMS_*`
    /// environment variables (e.g. `DMS_SLEEP_FRAMES=45`).
    pub fn load(path: Option<&Path>) -> Result<Self, DmsError> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| DmsError::Config(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            info!("Loading DMS configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(config::Environment::with_prefix("DMS").try_parsing(true));

        let cfg: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| DmsError::Config(e.to_string()))?;

        cfg.validate()?;
        debug!("Effective DMS configuration: {:?}", cfg);
        Ok(cfg)
    }

    /// Reject values that would make the engine meaningless
    pub fn validate(&self) -> Result<(), DmsError> {
        fn positive(name: &str, value: f64) -> Result<(), DmsError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(DmsError::Config(format!("{name} must be positive, got {value}")))
            }
        }

        positive("ear_threshold", self.ear_threshold)?;
        positive("mar_threshold", self.mar_threshold)?;
        positive("calibration_factor", self.calibration_factor)?;
        positive("variance_threshold", self.variance_threshold)?;
        positive("blink_frequency_threshold", self.blink_frequency_threshold)?;

        for (name, value) in [
            ("blink_min_gap_secs", self.blink_min_gap_secs),
            ("eye_fatigue_alert_secs", self.eye_fatigue_alert_secs),
            ("fatigue_warmup_secs", self.fatigue_warmup_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DmsError::Config(format!(
                    "{name} must be a non-negative number of seconds, got {value}"
                )));
            }
        }

        if self.calibration_samples == 0 {
            return Err(DmsError::Config("calibration_samples must be at least 1".into()));
        }
        if self.variance_window == 0 || self.variance_window > self.history_capacity {
            return Err(DmsError::Config(format!(
                "variance_window {} must be within 1..={}",
                self.variance_window, self.history_capacity
            )));
        }
        Ok(())
    }

    /// Copy of this configuration with a new eye-closure threshold.
    ///
    /// The engine swaps the whole value so readers never see a half-updated
    /// configuration.
    pub fn with_ear_threshold(&self, ear_threshold: f64) -> Self {
        Self {
            ear_threshold,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DmsConfig::default().validate().is_ok());
        assert!(DmsConfig::strict().validate().is_ok());
        assert!(DmsConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_presets_order() {
        assert!(DmsConfig::strict().sleep_frames < DmsConfig::default().sleep_frames);
        assert!(DmsConfig::lenient().sleep_frames > DmsConfig::default().sleep_frames);
    }

    #[test]
    fn test_rejects_bad_values() {
        let cfg = DmsConfig {
            ear_threshold: 0.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(DmsError::Config(_))));

        let cfg = DmsConfig {
            variance_window: 500,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = DmsConfig {
            calibration_samples: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_with_ear_threshold_keeps_other_fields() {
        let cfg = DmsConfig::strict();
        let updated = cfg.with_ear_threshold(0.24);
        assert_eq!(updated.ear_threshold, 0.24);
        assert_eq!(updated.sleep_frames, cfg.sleep_frames);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "sleep_frames = 45\nmar_threshold = 0.6").unwrap();

        let cfg = DmsConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.sleep_frames, 45);
        assert!((cfg.mar_threshold - 0.6).abs() < 1e-9);
        assert_eq!(cfg.yawn_frames, DmsConfig::default().yawn_frames);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "calibration_samples = 0").unwrap();
        assert!(DmsConfig::load(Some(file.path())).is_err());
    }
}
