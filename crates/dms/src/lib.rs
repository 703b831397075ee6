//! Driver Monitoring System (DMS)
//!
//! Drowsiness state engine over facial landmarks:
//! - Eye and mouth opening ratios per frame
//! - Personal eye-closure threshold calibration
//! - Blink, yawn, closed-eye and absence tracking
//! - Priority-ordered alertness modes with an eye-fatigue overlay
//!
//! Landmark detection, rendering and audio are external. One [`DmsModule`]
//! tracks exactly one subject and must be fed one frame at a time.

pub mod analysis;
pub mod calibration;
pub mod config;
pub mod detector;
pub mod fatigue;
pub mod geometry;
pub mod state;
pub mod tracker;

pub use analysis::{DmsAlert, DmsAnalysis, DmsPhase};
pub use calibration::{CalibrationStatus, Calibrator};
pub use config::DmsConfig;
pub use detector::LandmarkDetector;
pub use fatigue::{FatigueAssessment, FatigueEstimator};
pub use geometry::{FrameSignals, LandmarkSet, Point};
pub use state::{AlertMode, DriverState, FatigueAlert, StateMachine};
pub use tracker::TemporalTracker;

use std::time::Instant;

use state::StepInput;
use thiserror::Error;
use tracing::{debug, info};

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DmsError {
    #[error("Invalid landmark set: expected {expected} points, got {actual}")]
    InvalidLandmarks { expected: usize, actual: usize },

    #[error("Landmark {index} has a non-finite coordinate")]
    NonFiniteLandmark { index: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calibration error: {0}")]
    Calibration(String),

    #[error("Landmark detection failed: {0}")]
    Detector(String),
}

/// Driver monitoring module
pub struct DmsModule {
    config: DmsConfig,
    /// Configuration as supplied, before any calibrated threshold
    base_config: DmsConfig,
    calibrator: Calibrator,
    tracker: TemporalTracker,
    machine: StateMachine,
    fatigue: FatigueEstimator,
    state: DriverState,
    phase: DmsPhase,
}

impl DmsModule {
    /// Create a new DMS module that starts by calibrating
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        info!(
            "DMS starting in calibration ({} samples)",
            config.calibration_samples
        );
        Ok(Self {
            calibrator: Calibrator::from_config(&config),
            tracker: TemporalTracker::new(&config),
            machine: StateMachine::new(&config),
            fatigue: FatigueEstimator::new(&config),
            state: DriverState::default(),
            phase: DmsPhase::Calibrating,
            base_config: config.clone(),
            config,
        })
    }

    /// Create a module that monitors immediately with a previously
    /// calibrated threshold (e.g. loaded from a settings store)
    pub fn with_threshold(config: DmsConfig, ear_threshold: f64) -> Result<Self, DmsError> {
        if !ear_threshold.is_finite() || ear_threshold <= 0.0 {
            return Err(DmsError::Calibration(format!(
                "stored EAR threshold must be positive, got {ear_threshold}"
            )));
        }
        let mut module = Self::new(config.with_ear_threshold(ear_threshold))?;
        module.base_config = config;
        module.phase = DmsPhase::Monitoring;
        info!("DMS monitoring with stored EAR threshold {:.3}", ear_threshold);
        Ok(module)
    }

    /// Run the external detector on a frame and analyze the result
    pub fn analyze<D: LandmarkDetector>(
        &mut self,
        detector: &mut D,
        frame: &D::Frame,
        now: Instant,
    ) -> Result<DmsAnalysis, DmsError> {
        let landmarks = detector.detect(frame)?;
        Ok(self.process(landmarks.as_ref(), now))
    }

    /// Process one frame's landmarks (`None` = no face found)
    pub fn process(&mut self, landmarks: Option<&LandmarkSet>, now: Instant) -> DmsAnalysis {
        let signals = landmarks.map(FrameSignals::from_landmarks);
        match self.phase {
            DmsPhase::Calibrating => self.calibrate_frame(signals.as_ref(), now),
            DmsPhase::Monitoring => self.monitor_frame(signals.as_ref(), now),
        }
    }

    fn calibrate_frame(&mut self, signals: Option<&FrameSignals>, now: Instant) -> DmsAnalysis {
        let mut calibrated_threshold = None;

        if let Some(signals) = signals {
            if let CalibrationStatus::Complete { threshold } = self.calibrator.add_sample(signals.ear)
            {
                self.config = self.config.with_ear_threshold(threshold);
                self.state.reset();
                self.phase = DmsPhase::Monitoring;
                calibrated_threshold = Some(threshold);
            }
        }

        let fatigue = FatigueAssessment::default();
        let mut analysis = self.snapshot(signals, &fatigue, now);
        analysis.phase = DmsPhase::Calibrating;
        analysis.calibrated_threshold = calibrated_threshold;
        if calibrated_threshold.is_none() {
            analysis.calibration_progress = Some(self.calibrator.progress_percent());
        }
        analysis
    }

    fn monitor_frame(&mut self, signals: Option<&FrameSignals>, now: Instant) -> DmsAnalysis {
        let ear_threshold = self.config.ear_threshold;
        match signals {
            Some(signals) => {
                let update = self.tracker.observe_face(signals, ear_threshold, now);
                if update.blink_counted {
                    debug!("Blink #{}", self.tracker.total_blinks());
                }
            }
            None => self.tracker.observe_no_face(now),
        }

        let fatigue = self.fatigue.assess(
            self.tracker.total_blinks(),
            self.tracker.session_secs(now),
            self.tracker.ear_history(),
        );
        let input = StepInput {
            tracker: &self.tracker,
            signals,
            ear_threshold,
            fatigue: &fatigue,
            now,
        };
        self.state = self.machine.step(self.state, &input);

        self.snapshot(signals, &fatigue, now)
    }

    fn snapshot(
        &self,
        signals: Option<&FrameSignals>,
        fatigue: &FatigueAssessment,
        now: Instant,
    ) -> DmsAnalysis {
        let session_secs = self.tracker.session_secs(now);
        DmsAnalysis {
            phase: self.phase,
            face_detected: signals.is_some(),
            mode: self.state.mode,
            fatigue_alert_active: self.state.shows_fatigue_alert(),
            ear: signals.map(|s| s.ear),
            mar: signals.map(|s| s.mar),
            ear_threshold: self.config.ear_threshold,
            total_blinks: self.tracker.total_blinks(),
            yawn_frames: self.tracker.yawn_frames(),
            eyes_closed_frames: self.tracker.eyes_closed_frames(),
            no_face_frames: self.tracker.no_face_frames(),
            blink_frequency: FatigueEstimator::blink_frequency(
                self.tracker.total_blinks(),
                session_secs.max(1.0),
            ),
            ear_variance: fatigue.ear_variance,
            sleeping_duration_secs: self
                .state
                .sleeping_duration(now)
                .map(|d| d.as_secs_f64()),
            calibration_progress: None,
            calibrated_threshold: None,
            fps: self.tracker.fps(),
            alerts: DmsAnalysis::collect_alerts(
                self.state.mode,
                self.state.shows_fatigue_alert(),
            ),
        }
    }

    /// Discard calibration samples and collect a fresh set.
    ///
    /// Detection is suspended until the new calibration completes; the
    /// previous threshold stays operative until then. Session counters
    /// start from zero.
    pub fn recalibrate(&mut self) {
        info!("Recalibration requested");
        self.calibrator.reset();
        self.tracker.reset();
        self.state.reset();
        self.phase = DmsPhase::Calibrating;
    }

    /// Reset driver state (on driver change).
    ///
    /// Like [`recalibrate`](Self::recalibrate), but the previous driver's
    /// threshold is dropped in favour of the configured one.
    pub fn reset_state(&mut self) {
        self.recalibrate();
        self.config = self.base_config.clone();
        info!(
            "Driver state reset, EAR threshold back to {:.3}",
            self.config.ear_threshold
        );
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Operative eye-closure threshold
    pub fn ear_threshold(&self) -> f64 {
        self.config.ear_threshold
    }

    pub fn phase(&self) -> DmsPhase {
        self.phase
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn tracker(&self) -> &TemporalTracker {
        &self.tracker
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }
}
