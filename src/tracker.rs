use nalgebra as na;

use crate::associator::{Associator, Strategy};
use crate::color;
use crate::detection::Detection;
use crate::frame::Frame;
use crate::team::{TeamAssignment, TeamClassifier};
use crate::track::Track;

/// Player tracks survive this many consecutive missed frames.
pub const MAX_FRAMES_TO_SKIP: u32 = 5;

#[derive(Debug)]
pub struct PlayerTracker {
    tracks: Vec<Track>,
    next_track_id: u32,
    max_frames_to_skip: u32,
    associator: Associator,
    classifier: TeamClassifier,
    team_assignments: TeamAssignment,
}

impl Default for PlayerTracker {
    fn default() -> Self {
        Self::new(Strategy::Greedy)
    }
}

impl PlayerTracker {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            tracks: Vec::with_capacity(32),
            next_track_id: 0,
            max_frames_to_skip: MAX_FRAMES_TO_SKIP,
            associator: Associator::new(strategy),
            classifier: TeamClassifier::default(),
            team_assignments: TeamAssignment::new(),
        }
    }

    pub fn update(&mut self, detections: &[Detection], frame: &Frame) {
        for track in &mut self.tracks {
            track.predict();
        }

        let boxes: Vec<_> = self.tracks.iter().map(|t| t.last_box).collect();
        let mapping = self.associator.associate(&boxes, detections);

        for &(i, j) in &mapping.matches {
            let bbox = detections[j].bbox();
            let sample = color::dominant_color(frame, &bbox);
            self.tracks[i].correct(bbox, sample);
        }

        let max_skip = self.max_frames_to_skip;
        self.tracks.retain(|t| {
            let keep = t.frames_since_update <= max_skip;
            if !keep {
                tracing::trace!(track_id = t.track_id, "player track dropped");
            }
            keep
        });

        for &j in &mapping.unmatched {
            let bbox = detections[j].bbox();
            let sample = color::dominant_color(frame, &bbox);
            let id = self.next_track_id;
            self.next_track_id += 1;

            self.tracks.push(Track::new(id, bbox, sample));
        }
    }

    /// Smoothed ground positions of every live track, in store order.
    pub fn tracks(&self) -> Vec<(u32, na::Point2<f32>)> {
        self.tracks
            .iter()
            .map(|t| (t.track_id, t.position()))
            .collect()
    }

    #[inline]
    pub fn live_tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Re-clusters every live track's color. The previous assignment is
    /// replaced, so ids no longer alive drop out of it.
    pub fn assign_teams(&mut self) -> &TeamAssignment {
        if self.tracks.is_empty() {
            return &self.team_assignments;
        }

        let samples: Vec<_> = self
            .tracks
            .iter()
            .map(|t| (t.track_id, t.dominant_color))
            .collect();

        self.team_assignments = self.classifier.assign(&samples);

        for track in &mut self.tracks {
            track.team = self.team_assignments.get(&track.track_id).copied();
        }

        &self.team_assignments
    }

    #[inline]
    pub fn team_assignments(&self) -> &TeamAssignment {
        &self.team_assignments
    }
}
