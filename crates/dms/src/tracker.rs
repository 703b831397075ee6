//! Per-frame counters and rolling signal history
//!
//! Streak counters are frame counts, so their effective duration scales with
//! the camera frame rate. Blink spacing and session uptime are wall-clock.

use std::time::{Duration, Instant};

use ring_buffer::RingBuffer;
use tracing::{debug, trace};

use crate::geometry::FrameSignals;
use crate::DmsConfig;

/// Events produced by a face frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerUpdate {
    /// A blink finished on this frame and was counted
    pub blink_counted: bool,
}

/// Frames-per-second estimate over one-second windows
#[derive(Debug, Clone, Default)]
struct FrameRateMeter {
    window_start: Option<Instant>,
    frames: u32,
    fps: f64,
}

impl FrameRateMeter {
    fn tick(&mut self, now: Instant) {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_duration_since(start).as_secs_f64();
        if elapsed >= 1.0 {
            self.fps = f64::from(self.frames) / elapsed;
            self.frames = 0;
            self.window_start = Some(now);
        }
    }
}

/// Rolling counters feeding the state machine
#[derive(Debug, Clone)]
pub struct TemporalTracker {
    mar_threshold: f64,
    blink_min_frames: u32,
    blink_min_gap: Duration,

    no_face_frames: u32,
    eyes_closed_frames: u32,
    blink_frames: u32,
    eye_fatigue_frames: u32,
    yawn_frames: u32,
    total_blinks: u32,
    last_blink_at: Option<Instant>,

    ear_history: RingBuffer<f64>,
    session_start: Option<Instant>,
    frame_rate: FrameRateMeter,
}

impl TemporalTracker {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            mar_threshold: config.mar_threshold,
            blink_min_frames: config.blink_min_frames,
            blink_min_gap: Duration::try_from_secs_f64(config.blink_min_gap_secs)
                .unwrap_or_default(),
            no_face_frames: 0,
            eyes_closed_frames: 0,
            blink_frames: 0,
            eye_fatigue_frames: 0,
            yawn_frames: 0,
            total_blinks: 0,
            last_blink_at: None,
            ear_history: RingBuffer::new(config.history_capacity),
            session_start: None,
            frame_rate: FrameRateMeter::default(),
        }
    }

    /// Record a frame where the detector found no face.
    ///
    /// Only the no-face streak moves; eye and mouth streaks hold their values.
    pub fn observe_no_face(&mut self, now: Instant) {
        self.start_session(now);
        self.frame_rate.tick(now);
        self.no_face_frames = self.no_face_frames.saturating_add(1);
        trace!("No face for {} frames", self.no_face_frames);
    }

    /// Record a frame with measured signals against the current eye threshold
    pub fn observe_face(
        &mut self,
        signals: &FrameSignals,
        ear_threshold: f64,
        now: Instant,
    ) -> TrackerUpdate {
        let session_start = self.start_session(now);
        self.frame_rate.tick(now);
        self.no_face_frames = 0;

        let mut update = TrackerUpdate::default();

        if signals.ear < ear_threshold {
            self.eyes_closed_frames = self.eyes_closed_frames.saturating_add(1);
            self.blink_frames = self.blink_frames.saturating_add(1);
            self.eye_fatigue_frames = self.eye_fatigue_frames.saturating_add(1);
        } else {
            if self.blink_frames >= self.blink_min_frames {
                let last = self.last_blink_at.unwrap_or(session_start);
                if now.saturating_duration_since(last) >= self.blink_min_gap {
                    self.total_blinks = self.total_blinks.saturating_add(1);
                    self.last_blink_at = Some(now);
                    update.blink_counted = true;
                    debug!(
                        "Blink counted after {} closed frames (total {})",
                        self.blink_frames, self.total_blinks
                    );
                }
            }

            self.eyes_closed_frames = 0;
            self.blink_frames = 0;
            self.eye_fatigue_frames = 0;
        }

        if signals.mar > self.mar_threshold {
            self.yawn_frames = self.yawn_frames.saturating_add(1);
        } else {
            self.yawn_frames = self.yawn_frames.saturating_sub(1);
        }

        self.ear_history.push(signals.ear);
        update
    }

    /// Start a fresh session: all counters, history and timers cleared
    pub fn reset(&mut self) {
        self.no_face_frames = 0;
        self.eyes_closed_frames = 0;
        self.blink_frames = 0;
        self.eye_fatigue_frames = 0;
        self.yawn_frames = 0;
        self.total_blinks = 0;
        self.last_blink_at = None;
        self.ear_history.clear();
        self.session_start = None;
        self.frame_rate = FrameRateMeter::default();
    }

    fn start_session(&mut self, now: Instant) -> Instant {
        *self.session_start.get_or_insert(now)
    }

    pub fn no_face_frames(&self) -> u32 {
        self.no_face_frames
    }

    pub fn eyes_closed_frames(&self) -> u32 {
        self.eyes_closed_frames
    }

    /// Frames of the blink currently in progress
    pub fn blink_frames(&self) -> u32 {
        self.blink_frames
    }

    pub fn eye_fatigue_frames(&self) -> u32 {
        self.eye_fatigue_frames
    }

    pub fn yawn_frames(&self) -> u32 {
        self.yawn_frames
    }

    pub fn total_blinks(&self) -> u32 {
        self.total_blinks
    }

    pub fn ear_history(&self) -> &RingBuffer<f64> {
        &self.ear_history
    }

    /// Seconds since the first frame of this session (0.0 before any frame)
    pub fn session_secs(&self, now: Instant) -> f64 {
        self.session_start
            .map(|start| now.saturating_duration_since(start).as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Latest frames-per-second estimate (0.0 during the first second)
    pub fn fps(&self) -> f64 {
        self.frame_rate.fps
    }
}

impl Default for TemporalTracker {
    fn default() -> Self {
        Self::new(&DmsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 0.2;
    const FRAME: Duration = Duration::from_millis(33);

    fn signals(ear: f64, mar: f64) -> FrameSignals {
        FrameSignals {
            left_ear: ear,
            right_ear: ear,
            ear,
            mar,
        }
    }

    /// Drives frames with a monotonically advancing clock
    struct Clock {
        now: Instant,
    }

    impl Clock {
        fn new() -> Self {
            Self { now: Instant::now() }
        }

        fn frame(&mut self, tracker: &mut TemporalTracker, ear: f64, mar: f64) -> TrackerUpdate {
            self.now += FRAME;
            tracker.observe_face(&signals(ear, mar), THRESHOLD, self.now)
        }

        fn blink(&mut self, tracker: &mut TemporalTracker, closed_frames: u32) -> TrackerUpdate {
            for _ in 0..closed_frames {
                self.frame(tracker, 0.1, 0.1);
            }
            self.frame(tracker, 0.3, 0.1)
        }

        fn advance(&mut self, by: Duration) {
            self.now += by;
        }
    }

    #[test]
    fn test_blinks_spaced_apart_are_counted() {
        let mut tracker = TemporalTracker::default();
        let mut clock = Clock::new();
        clock.frame(&mut tracker, 0.3, 0.1);
        clock.advance(Duration::from_millis(600));

        assert!(clock.blink(&mut tracker, 3).blink_counted);
        clock.advance(Duration::from_millis(600));
        assert!(clock.blink(&mut tracker, 3).blink_counted);

        assert_eq!(tracker.total_blinks(), 2);
    }

    #[test]
    fn test_blinks_too_close_count_once() {
        let mut tracker = TemporalTracker::default();
        let mut clock = Clock::new();
        clock.frame(&mut tracker, 0.3, 0.1);
        clock.advance(Duration::from_millis(600));

        clock.blink(&mut tracker, 3);
        // Second blink reopens ~4 frames (~130 ms) later
        let update = clock.blink(&mut tracker, 3);

        assert!(!update.blink_counted);
        assert_eq!(tracker.eyes_closed_frames(), 0);
        assert_eq!(tracker.total_blinks(), 1);
    }

    #[test]
    fn test_short_closure_is_not_a_blink() {
        let mut tracker = TemporalTracker::default();
        let mut clock = Clock::new();
        clock.frame(&mut tracker, 0.3, 0.1);
        clock.advance(Duration::from_secs(1));

        let update = clock.blink(&mut tracker, 2);
        assert!(!update.blink_counted);
        assert_eq!(tracker.total_blinks(), 0);
        assert_eq!(tracker.eyes_closed_frames(), 0);
    }

    #[test]
    fn test_closed_and_fatigue_streaks_move_together() {
        let mut tracker = TemporalTracker::default();
        let mut clock = Clock::new();

        for _ in 0..25 {
            clock.frame(&mut tracker, 0.1, 0.1);
        }
        assert_eq!(tracker.eyes_closed_frames(), 25);
        assert_eq!(tracker.eye_fatigue_frames(), 25);
        assert_eq!(tracker.blink_frames(), 25);

        clock.frame(&mut tracker, 0.3, 0.1);
        assert_eq!(tracker.eyes_closed_frames(), 0);
        assert_eq!(tracker.eye_fatigue_frames(), 0);
    }

    #[test]
    fn test_yawn_streak_decays_by_one() {
        let mut tracker = TemporalTracker::default();
        let mut clock = Clock::new();

        for _ in 0..20 {
            clock.frame(&mut tracker, 0.3, 0.8);
        }
        assert_eq!(tracker.yawn_frames(), 20);

        clock.frame(&mut tracker, 0.3, 0.2);
        assert_eq!(tracker.yawn_frames(), 19);

        for _ in 0..30 {
            clock.frame(&mut tracker, 0.3, 0.2);
        }
        assert_eq!(tracker.yawn_frames(), 0);
    }

    #[test]
    fn test_no_face_streak_resets_on_face() {
        let mut tracker = TemporalTracker::default();
        let mut clock = Clock::new();

        for _ in 0..5 {
            clock.frame(&mut tracker, 0.1, 0.1);
        }
        for _ in 0..10 {
            clock.advance(FRAME);
            tracker.observe_no_face(clock.now);
        }
        assert_eq!(tracker.no_face_frames(), 10);
        // Eye streak is frozen while the face is missing
        assert_eq!(tracker.eyes_closed_frames(), 5);

        clock.frame(&mut tracker, 0.1, 0.1);
        assert_eq!(tracker.no_face_frames(), 0);
        assert_eq!(tracker.eyes_closed_frames(), 6);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = TemporalTracker::default();
        let mut clock = Clock::new();
        for _ in 0..400 {
            clock.frame(&mut tracker, 0.3, 0.1);
        }
        assert_eq!(tracker.ear_history().len(), 300);
    }

    #[test]
    fn test_session_and_fps() {
        let mut tracker = TemporalTracker::default();
        let mut clock = Clock::new();
        assert_eq!(tracker.session_secs(clock.now), 0.0);

        let start = clock.now + FRAME;
        for _ in 0..61 {
            clock.frame(&mut tracker, 0.3, 0.1);
        }
        let elapsed = clock.now.duration_since(start).as_secs_f64();
        assert!((tracker.session_secs(clock.now) - elapsed).abs() < 1e-9);
        assert!(tracker.fps() > 25.0 && tracker.fps() < 35.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tracker = TemporalTracker::default();
        let mut clock = Clock::new();
        clock.advance(Duration::from_secs(1));
        clock.blink(&mut tracker, 4);
        tracker.reset();

        assert_eq!(tracker.total_blinks(), 0);
        assert!(tracker.ear_history().is_empty());
        assert_eq!(tracker.session_secs(clock.now), 0.0);
    }
}
