use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltwh};

/// COCO class id of a person.
pub const PLAYER_CLASS: i32 = 0;

/// COCO class id of a sports ball.
pub const BALL_CLASS: i32 = 32;

/// Contains (x,y) of the left top corner and (width,height) of bbox
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class: i32,
}

impl Detection {
    pub fn new(bbox: BBox<Ltwh>, confidence: f32, class: i32) -> Self {
        Self {
            x: bbox.left(),
            y: bbox.top(),
            w: bbox.width(),
            h: bbox.height(),
            confidence,
            class,
        }
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Ltwh> {
        BBox::ltwh(self.x, self.y, self.w, self.h)
    }

    #[inline]
    pub fn iou(&self, other: &Detection) -> f32 {
        self.bbox().iou(&other.bbox())
    }
}

/// Splits raw detector output into player and ball candidates.
#[derive(Debug, Clone, Copy)]
pub struct ClassFilter {
    pub player_class: i32,
    pub ball_class: i32,
    pub confidence_threshold: f32,
}

impl ClassFilter {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            player_class: PLAYER_CLASS,
            ball_class: BALL_CLASS,
            confidence_threshold,
        }
    }

    pub fn split(&self, detections: &[Detection]) -> (Vec<Detection>, Vec<Detection>) {
        let mut players = Vec::new();
        let mut balls = Vec::new();

        for det in detections {
            if det.confidence < self.confidence_threshold {
                continue;
            }

            if det.class == self.player_class {
                players.push(*det);
            } else if det.class == self.ball_class {
                balls.push(*det);
            }
        }

        (players, balls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class: i32, confidence: f32) -> Detection {
        Detection::new(BBox::ltwh(0.0, 0.0, 10.0, 20.0), confidence, class)
    }

    #[test]
    fn split_by_class_and_confidence() {
        let filter = ClassFilter::new(0.5);
        let dets = [
            det(PLAYER_CLASS, 0.9),
            det(PLAYER_CLASS, 0.3),
            det(BALL_CLASS, 0.5),
            det(2, 0.99),
        ];

        let (players, balls) = filter.split(&dets);
        assert_eq!(players.len(), 1);
        assert_eq!(balls.len(), 1);
        assert_eq!(balls[0].confidence, 0.5);
    }

    #[test]
    fn deserializes_short_field_names() {
        let det: Detection =
            serde_json::from_str(r#"{"x":1.0,"y":2.0,"w":3.0,"h":4.0,"p":0.75,"c":32}"#).unwrap();

        assert_eq!(det.class, BALL_CLASS);
        assert_eq!(det.bbox().as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }
}
