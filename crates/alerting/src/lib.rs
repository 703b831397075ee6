//! Alerting System
//!
//! Turns per-frame driver-state alerts into raise / change / clear events
//! with a stop delay and acknowledgement.

mod manager;

pub use manager::{AlertConfig, AlertEvent, AlertManager, AlertState};
