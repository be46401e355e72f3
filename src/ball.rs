use nalgebra as na;

use crate::detection::Detection;
use crate::motion::MotionFilter;

/// The ball always reports this id. Player ids live in their own space.
pub const BALL_TRACK_ID: u32 = 0;

/// The ball may stay hidden this many consecutive frames.
pub const MAX_FRAMES_TO_SKIP: u32 = 10;

#[derive(Debug)]
pub struct BallTracker {
    filter: Option<MotionFilter>,
    frames_since_detection: u32,
    max_frames_to_skip: u32,
    position: Option<na::Point2<f32>>,
}

impl Default for BallTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BallTracker {
    pub fn new() -> Self {
        Self {
            filter: None,
            frames_since_detection: 0,
            max_frames_to_skip: MAX_FRAMES_TO_SKIP,
            position: None,
        }
    }

    pub fn update(&mut self, detections: &[Detection]) {
        let best = detections.iter().fold(None, |best: Option<&Detection>, det| match best {
            Some(b) if b.confidence >= det.confidence => Some(b),
            _ => Some(det),
        });

        if let Some(det) = best {
            let pt = det.bbox().bottom_center();
            match self.filter.as_mut() {
                Some(kf) => {
                    kf.correct(pt);
                }
                None => self.filter = Some(MotionFilter::new(pt)),
            }
            self.frames_since_detection = 0;
        } else if self.filter.is_some() {
            self.frames_since_detection += 1;
            if self.frames_since_detection > self.max_frames_to_skip {
                tracing::trace!("ball lost");
                self.filter = None;
                self.position = None;
            }
        }

        if let Some(kf) = self.filter.as_mut() {
            self.position = Some(kf.predict());
        }
    }

    /// `(BALL_TRACK_ID, position)` while the ball is tracked.
    #[inline]
    pub fn track(&self) -> Option<(u32, na::Point2<f32>)> {
        self.position.map(|pt| (BALL_TRACK_ID, pt))
    }

    #[inline]
    pub fn is_tracking(&self) -> bool {
        self.filter.is_some()
    }

    #[inline]
    pub fn frames_since_detection(&self) -> u32 {
        self.frames_since_detection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::detection::BALL_CLASS;

    fn ball(l: f32, confidence: f32) -> Detection {
        Detection::new(BBox::ltwh(l, 100.0, 10.0, 10.0), confidence, BALL_CLASS)
    }

    #[test]
    fn no_track_before_first_detection() {
        let mut tracker = BallTracker::new();
        assert!(tracker.track().is_none());

        tracker.update(&[]);
        assert!(tracker.track().is_none());
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn picks_most_confident_detection() {
        let mut tracker = BallTracker::new();
        tracker.update(&[ball(0.0, 0.4), ball(50.0, 0.9), ball(100.0, 0.9)]);

        let (id, pt) = tracker.track().unwrap();
        assert_eq!(id, BALL_TRACK_ID);
        assert_eq!(pt, na::Point2::new(55.0, 110.0));
    }

    #[test]
    fn survives_ten_missed_frames() {
        let mut tracker = BallTracker::new();
        tracker.update(&[ball(0.0, 0.8)]);

        for missed in 1..=10 {
            tracker.update(&[]);
            assert_eq!(tracker.frames_since_detection(), missed);
            assert!(tracker.track().is_some());
        }

        tracker.update(&[]);
        assert!(tracker.track().is_none());
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn reacquires_with_fresh_filter() {
        let mut tracker = BallTracker::new();
        tracker.update(&[ball(0.0, 0.8)]);
        for _ in 0..11 {
            tracker.update(&[]);
        }

        tracker.update(&[ball(200.0, 0.8)]);
        let (id, pt) = tracker.track().unwrap();
        assert_eq!(id, BALL_TRACK_ID);
        assert_eq!(pt, na::Point2::new(205.0, 110.0));
        assert_eq!(tracker.frames_since_detection(), 0);
    }
}
