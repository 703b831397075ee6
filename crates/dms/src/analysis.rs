//! DMS analysis results and alerts

use serde::{Deserialize, Serialize};

use crate::state::AlertMode;

/// DMS alert types, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmsAlert {
    /// Eyes closed long enough to be asleep
    Sleeping,

    /// Face not visible (driver absent or looking away)
    Distracted,

    /// Eyes closed long enough to indicate eye fatigue
    EyeFatigue,

    /// Sustained yawning
    Yawning,

    /// Blink pattern indicates tiredness
    Tired,
}

impl DmsAlert {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmsAlert::Sleeping => "sleeping",
            DmsAlert::Distracted => "distracted",
            DmsAlert::EyeFatigue => "eye_fatigue",
            DmsAlert::Yawning => "yawning",
            DmsAlert::Tired => "tired",
        }
    }

    fn from_mode(mode: AlertMode) -> Option<Self> {
        match mode {
            AlertMode::Default => None,
            AlertMode::Drowsy => Some(DmsAlert::Yawning),
            AlertMode::Sleeping => Some(DmsAlert::Sleeping),
            AlertMode::Distracted => Some(DmsAlert::Distracted),
            AlertMode::Tired => Some(DmsAlert::Tired),
        }
    }
}

/// Engine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmsPhase {
    /// Collecting open-eye samples; detection suspended
    #[default]
    Calibrating,
    /// Detection running against the operative threshold
    Monitoring,
}

/// Read-only snapshot of one processed frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmsAnalysis {
    /// Engine phase when the frame was processed
    pub phase: DmsPhase,

    /// Whether a face was detected
    pub face_detected: bool,

    /// Current alertness mode
    pub mode: AlertMode,

    /// Eye-fatigue alert as presented (hidden while sleeping)
    pub fatigue_alert_active: bool,

    /// Averaged eye-opening ratio (if a face was detected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ear: Option<f64>,

    /// Mouth-opening ratio (if a face was detected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mar: Option<f64>,

    /// Operative eye-closure threshold
    pub ear_threshold: f64,

    /// Blinks counted this session
    pub total_blinks: u32,

    /// Open-mouth streak
    pub yawn_frames: u32,

    /// Closed-eye streak
    pub eyes_closed_frames: u32,

    /// No-face streak
    pub no_face_frames: u32,

    /// Blinks per second over the session
    pub blink_frequency: f64,

    /// Trailing-window EAR variance
    pub ear_variance: f64,

    /// Seconds spent in the current sleeping alert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleeping_duration_secs: Option<f64>,

    /// Calibration completion (percent) while calibrating
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_progress: Option<f64>,

    /// Threshold produced by a calibration that completed on this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibrated_threshold: Option<f64>,

    /// Frames-per-second estimate
    pub fps: f64,

    /// Active alerts
    pub alerts: Vec<DmsAlert>,
}

impl DmsAnalysis {
    /// Derive the alert list from the mode and the visible fatigue overlay
    pub(crate) fn collect_alerts(mode: AlertMode, fatigue_visible: bool) -> Vec<DmsAlert> {
        let mut alerts: Vec<DmsAlert> = DmsAlert::from_mode(mode).into_iter().collect();
        if fatigue_visible {
            alerts.push(DmsAlert::EyeFatigue);
        }
        alerts.sort();
        alerts
    }

    /// Check if any alerts are active
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }

    /// Get highest severity alert
    pub fn highest_severity_alert(&self) -> Option<DmsAlert> {
        // Priority: Sleeping > Distracted > EyeFatigue > Yawning > Tired
        self.alerts.iter().min().copied()
    }
}
