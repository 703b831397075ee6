//! Driver state tracking and alert-mode decisions

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fatigue::FatigueAssessment;
use crate::geometry::FrameSignals;
use crate::tracker::TemporalTracker;
use crate::DmsConfig;

/// Alertness mode, exactly one active per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMode {
    #[default]
    Default,
    /// Sustained yawning
    Drowsy,
    /// Eyes closed for a long streak
    Sleeping,
    /// Face absent for a long streak
    Distracted,
    /// Blink frequency or gaze steadiness indicates fatigue
    Tired,
}

impl AlertMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertMode::Default => "default",
            AlertMode::Drowsy => "drowsy",
            AlertMode::Sleeping => "sleeping",
            AlertMode::Distracted => "distracted",
            AlertMode::Tired => "tired",
        }
    }
}

/// Eye-fatigue overlay, independent of [`AlertMode`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FatigueAlert {
    activated_at: Option<Instant>,
}

impl FatigueAlert {
    pub fn is_active(&self) -> bool {
        self.activated_at.is_some()
    }

    pub fn activated_at(&self) -> Option<Instant> {
        self.activated_at
    }

    pub fn active_for(&self, now: Instant) -> Option<Duration> {
        self.activated_at
            .map(|since| now.saturating_duration_since(since))
    }
}

/// Per-subject decision state carried from one frame to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverState {
    /// Current alertness mode
    pub mode: AlertMode,

    /// Eye-fatigue overlay
    pub fatigue_alert: FatigueAlert,

    /// Start of the current sleeping alert
    pub sleep_started_at: Option<Instant>,
}

impl DriverState {
    /// How long the current sleeping alert has lasted
    pub fn sleeping_duration(&self, now: Instant) -> Option<Duration> {
        self.sleep_started_at
            .map(|since| now.saturating_duration_since(since))
    }

    /// Eye-fatigue alert as presented to consumers (hidden while sleeping)
    pub fn shows_fatigue_alert(&self) -> bool {
        self.fatigue_alert.is_active() && self.mode != AlertMode::Sleeping
    }

    /// Reset state (on driver change)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything the state machine reads for one frame
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    pub tracker: &'a TemporalTracker,
    /// Signals of this frame, `None` when no face was found
    pub signals: Option<&'a FrameSignals>,
    pub ear_threshold: f64,
    pub fatigue: &'a FatigueAssessment,
    pub now: Instant,
}

/// Priority-ordered alert-mode decision
#[derive(Debug, Clone)]
pub struct StateMachine {
    sleep_frames: u32,
    yawn_frames: u32,
    no_face_frames: u32,
    eye_fatigue_frames: u32,
    fatigue_alert_min: Duration,
    fatigue_warmup_secs: f64,
}

impl StateMachine {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            sleep_frames: config.sleep_frames,
            yawn_frames: config.yawn_frames,
            no_face_frames: config.no_face_frames,
            eye_fatigue_frames: config.eye_fatigue_frames,
            fatigue_alert_min: Duration::try_from_secs_f64(config.eye_fatigue_alert_secs)
                .unwrap_or_default(),
            fatigue_warmup_secs: config.fatigue_warmup_secs,
        }
    }

    /// Compute the next state from the previous one and this frame's counters.
    ///
    /// Priority: Distracted > Sleeping > Drowsy > Tired > Default. The
    /// eye-fatigue overlay is updated first and blocks Drowsy and Tired.
    pub fn step(&self, prev: DriverState, input: &StepInput<'_>) -> DriverState {
        let tracker = input.tracker;
        let fatigue_alert = self.next_fatigue_alert(prev.fatigue_alert, input);

        let sleeping = tracker.eyes_closed_frames() >= self.sleep_frames;
        let sleep_started_at = if sleeping {
            Some(prev.sleep_started_at.unwrap_or(input.now))
        } else {
            None
        };

        let mode = if tracker.no_face_frames() > self.no_face_frames {
            AlertMode::Distracted
        } else if sleeping {
            AlertMode::Sleeping
        } else if tracker.yawn_frames() >= self.yawn_frames && !fatigue_alert.is_active() {
            AlertMode::Drowsy
        } else if tracker.session_secs(input.now) > self.fatigue_warmup_secs
            && !fatigue_alert.is_active()
            && input.fatigue.fatigued
        {
            AlertMode::Tired
        } else {
            AlertMode::Default
        };

        if mode != prev.mode {
            info!("Driver mode: {} -> {}", prev.mode.as_str(), mode.as_str());
        }

        DriverState {
            mode,
            fatigue_alert,
            sleep_started_at,
        }
    }

    fn next_fatigue_alert(&self, prev: FatigueAlert, input: &StepInput<'_>) -> FatigueAlert {
        match prev.activated_at {
            None if input.tracker.eye_fatigue_frames() >= self.eye_fatigue_frames => {
                debug!(
                    "Eye-fatigue alert raised after {} closed frames",
                    input.tracker.eye_fatigue_frames()
                );
                FatigueAlert {
                    activated_at: Some(input.now),
                }
            }
            Some(since) => {
                let expired = input.now.saturating_duration_since(since) >= self.fatigue_alert_min;
                let eyes_open = input
                    .signals
                    .is_some_and(|s| s.ear > input.ear_threshold);
                if expired && eyes_open {
                    debug!("Eye-fatigue alert cleared");
                    FatigueAlert::default()
                } else {
                    prev
                }
            }
            None => prev,
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(&DmsConfig::default())
    }
}
