use nalgebra as na;

use crate::bbox::{BBox, Ltwh};
use crate::color::{self, Hsv};
use crate::motion::MotionFilter;
use crate::team::Team;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// matched or created this frame
    Active,
    /// missed one or more consecutive frames
    Stale,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub track_id: u32,
    pub filter: MotionFilter,
    pub last_box: BBox<Ltwh>,
    pub frames_since_update: u32,
    pub dominant_color: Hsv,
    pub team: Option<Team>,
}

impl Track {
    pub fn new(track_id: u32, bbox: BBox<Ltwh>, dominant_color: Option<Hsv>) -> Self {
        Self {
            track_id,
            filter: MotionFilter::new(bbox.bottom_center()),
            last_box: bbox,
            frames_since_update: 0,
            dominant_color: dominant_color.unwrap_or_else(color::black),
            team: None,
        }
    }

    /// Moves the box to the predicted ground point and counts the frame as missed
    /// until a match proves otherwise.
    pub fn predict(&mut self) {
        let pt = self.filter.predict();
        self.last_box = self.last_box.with_bottom_center(pt);
        self.frames_since_update += 1;
    }

    pub fn correct(&mut self, bbox: BBox<Ltwh>, dominant_color: Option<Hsv>) {
        self.filter.correct(bbox.bottom_center());
        self.last_box = bbox;
        self.frames_since_update = 0;

        if let Some(c) = dominant_color {
            self.dominant_color = c;
        }
    }

    #[inline]
    pub fn position(&self) -> na::Point2<f32> {
        self.filter.state()
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        if self.frames_since_update == 0 {
            TrackState::Active
        } else {
            TrackState::Stale
        }
    }
}
