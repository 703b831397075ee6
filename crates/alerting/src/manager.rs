//! Alert Manager Implementation

use dms::DmsAlert;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// How long an alert keeps sounding after its condition clears (seconds)
    pub stop_delay_secs: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            stop_delay_secs: 2.0,
        }
    }
}

/// Transition of the latched alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "alert", rename_all = "snake_case")]
pub enum AlertEvent {
    /// An alert started
    Raised(DmsAlert),
    /// The most severe alert changed while latched
    Changed { from: DmsAlert, to: DmsAlert },
    /// The latched alert ended after the stop delay
    Cleared(DmsAlert),
}

/// Bookkeeping for one alert kind
#[derive(Debug, Clone)]
pub struct AlertState {
    /// Last time this alert was raised
    pub last_fired: Instant,
    /// Number of times raised
    pub fire_count: usize,
}

/// Latches the most severe alert and debounces its end
pub struct AlertManager {
    /// Configuration
    config: AlertConfig,
    /// Stop delay
    stop_delay: Duration,
    /// Statistics by alert kind
    states: HashMap<DmsAlert, AlertState>,
    /// Currently latched alert
    active: Option<DmsAlert>,
    /// When the condition behind the latched alert disappeared
    clear_pending_since: Option<Instant>,
    /// Whether the latched alert was acknowledged (muted)
    acknowledged: bool,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self {
            stop_delay: Duration::try_from_secs_f64(config.stop_delay_secs).unwrap_or_default(),
            config,
            states: HashMap::new(),
            active: None,
            clear_pending_since: None,
            acknowledged: false,
        }
    }

    /// Feed the most severe alert of the current frame
    pub fn update(&mut self, current: Option<DmsAlert>, now: Instant) -> Option<AlertEvent> {
        match (self.active, current) {
            (None, None) => None,
            (None, Some(alert)) => {
                self.latch(alert, now);
                info!("Alert raised: {}", alert.as_str());
                Some(AlertEvent::Raised(alert))
            }
            (Some(active), Some(alert)) => {
                if self.clear_pending_since.take().is_some() {
                    debug!("Alert {} resumed before stop delay", active.as_str());
                }
                if alert == active {
                    return None;
                }
                self.latch(alert, now);
                info!("Alert changed: {} -> {}", active.as_str(), alert.as_str());
                Some(AlertEvent::Changed {
                    from: active,
                    to: alert,
                })
            }
            (Some(active), None) => {
                let since = *self.clear_pending_since.get_or_insert(now);
                if now.saturating_duration_since(since) < self.stop_delay {
                    return None;
                }
                self.active = None;
                self.clear_pending_since = None;
                self.acknowledged = false;
                info!("Alert cleared: {}", active.as_str());
                Some(AlertEvent::Cleared(active))
            }
        }
    }

    fn latch(&mut self, alert: DmsAlert, now: Instant) {
        self.active = Some(alert);
        self.acknowledged = false;

        let state = self.states.entry(alert).or_insert(AlertState {
            last_fired: now,
            fire_count: 0,
        });
        state.last_fired = now;
        state.fire_count += 1;
    }

    /// Mute the latched alert until it clears
    pub fn acknowledge(&mut self) -> bool {
        match self.active {
            Some(alert) => {
                self.acknowledged = true;
                info!("Alert acknowledged: {}", alert.as_str());
                true
            }
            None => false,
        }
    }

    /// Whether the consumer should be sounding an alarm
    pub fn is_sounding(&self) -> bool {
        self.active.is_some() && !self.acknowledged
    }

    /// Currently latched alert
    pub fn active(&self) -> Option<DmsAlert> {
        self.active
    }

    /// Number of times an alert kind was raised
    pub fn fire_count(&self, alert: DmsAlert) -> usize {
        self.states.get(&alert).map_or(0, |s| s.fire_count)
    }

    /// Statistics for an alert kind
    pub fn state(&self, alert: DmsAlert) -> Option<&AlertState> {
        self.states.get(&alert)
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Clear all alert states
    pub fn clear(&mut self) {
        self.states.clear();
        self.active = None;
        self.clear_pending_since = None;
        self.acknowledged = false;
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_raise_and_clear_after_delay() {
        let mut manager = AlertManager::default();
        let t0 = Instant::now();

        assert_eq!(manager.update(None, t0), None);
        assert_eq!(
            manager.update(Some(DmsAlert::Sleeping), t0),
            Some(AlertEvent::Raised(DmsAlert::Sleeping))
        );
        assert_eq!(manager.update(Some(DmsAlert::Sleeping), t0 + secs(0.1)), None);

        // Condition gone: keeps sounding during the stop delay
        assert_eq!(manager.update(None, t0 + secs(1.0)), None);
        assert!(manager.is_sounding());
        assert_eq!(manager.update(None, t0 + secs(2.9)), None);

        assert_eq!(
            manager.update(None, t0 + secs(3.0)),
            Some(AlertEvent::Cleared(DmsAlert::Sleeping))
        );
        assert!(!manager.is_sounding());
    }

    #[test]
    fn test_resume_cancels_pending_clear() {
        let mut manager = AlertManager::default();
        let t0 = Instant::now();

        manager.update(Some(DmsAlert::Yawning), t0);
        manager.update(None, t0 + secs(1.0));
        assert_eq!(manager.update(Some(DmsAlert::Yawning), t0 + secs(1.5)), None);

        // Delay restarts from the next gap
        assert_eq!(manager.update(None, t0 + secs(2.0)), None);
        assert_eq!(manager.update(None, t0 + secs(3.5)), None);
        assert!(manager.update(None, t0 + secs(4.0)).is_some());
        assert_eq!(manager.fire_count(DmsAlert::Yawning), 1);
    }

    #[test]
    fn test_change_of_most_severe_alert() {
        let mut manager = AlertManager::default();
        let t0 = Instant::now();

        manager.update(Some(DmsAlert::EyeFatigue), t0);
        assert_eq!(
            manager.update(Some(DmsAlert::Sleeping), t0 + secs(0.5)),
            Some(AlertEvent::Changed {
                from: DmsAlert::EyeFatigue,
                to: DmsAlert::Sleeping
            })
        );
        assert_eq!(manager.active(), Some(DmsAlert::Sleeping));
        assert_eq!(manager.fire_count(DmsAlert::Sleeping), 1);
    }

    #[test]
    fn test_zero_delay_clears_immediately() {
        let mut manager = AlertManager::new(AlertConfig {
            stop_delay_secs: 0.0,
        });
        let t0 = Instant::now();
        manager.update(Some(DmsAlert::Distracted), t0);
        assert_eq!(
            manager.update(None, t0),
            Some(AlertEvent::Cleared(DmsAlert::Distracted))
        );
    }

    #[test]
    fn test_acknowledgement() {
        let mut manager = AlertManager::default();
        assert!(!manager.acknowledge());

        let t0 = Instant::now();
        manager.update(Some(DmsAlert::Tired), t0);
        assert!(manager.is_sounding());
        assert!(manager.acknowledge());
        assert!(!manager.is_sounding());

        // A new, different alert sounds again
        manager.update(Some(DmsAlert::Sleeping), t0 + secs(1.0));
        assert!(manager.is_sounding());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut manager = AlertManager::default();
        manager.update(Some(DmsAlert::Tired), Instant::now());
        manager.clear();
        assert_eq!(manager.active(), None);
        assert_eq!(manager.fire_count(DmsAlert::Tired), 0);
        assert!(manager.state(DmsAlert::Tired).is_none());
    }
}
