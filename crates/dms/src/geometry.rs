//! Facial landmark geometry and per-frame signal ratios
//!
//! Landmarks follow the 68-point facial convention:
//! right eye 36..42, left eye 42..48, mouth 48..68.

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Number of points in a landmark set
pub const LANDMARK_COUNT: usize = 68;

/// First index of the right eye block
pub const RIGHT_EYE_START: usize = 36;
/// First index of the left eye block
pub const LEFT_EYE_START: usize = 42;
/// First index of the mouth block
pub const MOUTH_START: usize = 48;

/// 2D landmark point in image coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Validated set of 68 facial landmarks for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Point; LANDMARK_COUNT],
}

impl LandmarkSet {
    /// Validate raw detector output.
    ///
    /// A wrong point count or non-finite coordinate means the landmark
    /// provider is broken, so it is surfaced as an error instead of being
    /// absorbed like signal noise.
    pub fn new(points: Vec<Point>) -> Result<Self, DmsError> {
        let actual = points.len();
        let points: [Point; LANDMARK_COUNT] =
            points.try_into().map_err(|_| DmsError::InvalidLandmarks {
                expected: LANDMARK_COUNT,
                actual,
            })?;

        if let Some(index) = points
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(DmsError::NonFiniteLandmark { index });
        }

        Ok(Self { points })
    }

    /// All points in detector order
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Right eye: outer, two upper lid, inner, two lower lid
    pub fn right_eye(&self) -> [Point; 6] {
        self.block(RIGHT_EYE_START)
    }

    /// Left eye in the same point order as [`LandmarkSet::right_eye`]
    pub fn left_eye(&self) -> [Point; 6] {
        self.block(LEFT_EYE_START)
    }

    /// Outer and inner mouth contour (20 points)
    pub fn mouth(&self) -> [Point; 20] {
        self.block(MOUTH_START)
    }

    /// Apply a uniform translation to every point
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            points: self.points.map(|p| Point::new(p.x + dx, p.y + dy)),
        }
    }

    fn block<const N: usize>(&self, start: usize) -> [Point; N] {
        std::array::from_fn(|i| self.points[start + i])
    }
}

/// Eye-opening ratio (EAR) for one eye.
///
/// Returns 0.0 when the horizontal eye width collapses to zero.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> f64 {
    let a = eye[1].distance(&eye[5]);
    let b = eye[2].distance(&eye[4]);
    let c = eye[0].distance(&eye[3]);

    if c <= f64::EPSILON {
        return 0.0;
    }
    (a + b) / (2.0 * c)
}

/// Mouth-opening ratio (MAR) over the 20-point mouth block.
///
/// Returns 0.0 when the inner mouth width collapses to zero.
pub fn mouth_aspect_ratio(mouth: &[Point; 20]) -> f64 {
    let a = mouth[13].distance(&mouth[19]);
    let b = mouth[14].distance(&mouth[18]);
    let c = mouth[15].distance(&mouth[17]);
    let d = mouth[12].distance(&mouth[16]);

    if d <= f64::EPSILON {
        return 0.0;
    }
    (a + b + c) / (3.0 * d)
}

/// Signals derived from one frame's landmarks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSignals {
    pub left_ear: f64,
    pub right_ear: f64,
    /// Average of both eyes
    pub ear: f64,
    pub mar: f64,
}

impl FrameSignals {
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Self {
        let left_ear = eye_aspect_ratio(&landmarks.left_eye());
        let right_ear = eye_aspect_ratio(&landmarks.right_eye());
        Self {
            left_ear,
            right_ear,
            ear: (left_ear + right_ear) / 2.0,
            mar: mouth_aspect_ratio(&landmarks.mouth()),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Eye with horizontal width 30 and lid gap `opening` on both verticals
    pub fn eye(ox: f32, oy: f32, opening: f32) -> [Point; 6] {
        let half = opening / 2.0;
        [
            Point::new(ox, oy),
            Point::new(ox + 10.0, oy - half),
            Point::new(ox + 20.0, oy - half),
            Point::new(ox + 30.0, oy),
            Point::new(ox + 20.0, oy + half),
            Point::new(ox + 10.0, oy + half),
        ]
    }

    /// Mouth whose inner contour is 40 wide and `opening` tall
    pub fn mouth(ox: f32, oy: f32, opening: f32) -> [Point; 20] {
        let half = opening / 2.0;
        let mut m = [Point::new(ox, oy); 20];
        for (i, p) in m.iter_mut().enumerate().take(12) {
            *p = Point::new(ox - 5.0 + i as f32 * 5.0, oy);
        }
        m[12] = Point::new(ox, oy);
        m[13] = Point::new(ox + 10.0, oy - half);
        m[14] = Point::new(ox + 20.0, oy - half);
        m[15] = Point::new(ox + 30.0, oy - half);
        m[16] = Point::new(ox + 40.0, oy);
        m[17] = Point::new(ox + 30.0, oy + half);
        m[18] = Point::new(ox + 20.0, oy + half);
        m[19] = Point::new(ox + 10.0, oy + half);
        m
    }

    /// Full face with the given eye and mouth openings
    pub fn face(eye_opening: f32, mouth_opening: f32) -> LandmarkSet {
        let mut points = vec![Point::new(100.0, 100.0); LANDMARK_COUNT];
        points[RIGHT_EYE_START..LEFT_EYE_START].copy_from_slice(&eye(60.0, 80.0, eye_opening));
        points[LEFT_EYE_START..MOUTH_START].copy_from_slice(&eye(110.0, 80.0, eye_opening));
        points[MOUTH_START..].copy_from_slice(&mouth(80.0, 150.0, mouth_opening));
        LandmarkSet::new(points).unwrap()
    }
}
