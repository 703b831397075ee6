//! Landmark provider seam
//!
//! Face detection and landmark regression live outside this crate. A
//! detector maps one captured frame to the 68-point landmark set, or `None`
//! when no face is visible.

use crate::geometry::LandmarkSet;
use crate::DmsError;

/// External facial-landmark detector
pub trait LandmarkDetector {
    /// Captured frame type
    type Frame;

    /// Detect the subject's landmarks in `frame`.
    ///
    /// `Ok(None)` means no face was found. Malformed detector output must be
    /// reported as [`DmsError::InvalidLandmarks`] rather than coerced.
    fn detect(&mut self, frame: &Self::Frame) -> Result<Option<LandmarkSet>, DmsError>;
}
