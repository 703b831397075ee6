//! Feature Engineering Engine
//!
//! Provides statistical feature extraction over windows of facial signals
//! (eye-opening ratio history, calibration samples).

mod statistics;

pub use statistics::{variance, StatisticalFeatures};
