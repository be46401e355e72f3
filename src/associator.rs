use munkres::{solve_assignment, WeightMatrix};
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltwh};
use crate::detection::Detection;

/// A track and a detection are only paired when their IOU is strictly above this.
pub const IOU_THRESHOLD: f32 = 0.3;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Tracks pick their best remaining detection in creation order.
    #[default]
    Greedy,
    /// Hungarian assignment maximising total IOU.
    Optimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    /// (track index, detection index), ordered by track index
    pub matches: Vec<(usize, usize)>,
    /// detection indexes left for new tracks, ascending
    pub unmatched: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct Associator {
    pub strategy: Strategy,
    pub threshold: f32,
}

impl Default for Associator {
    fn default() -> Self {
        Self::new(Strategy::Greedy)
    }
}

impl Associator {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            threshold: IOU_THRESHOLD,
        }
    }

    pub fn associate(&self, tracks: &[BBox<Ltwh>], detections: &[Detection]) -> Association {
        if tracks.is_empty() || detections.is_empty() {
            return Association {
                matches: Vec::new(),
                unmatched: (0..detections.len()).collect(),
            };
        }

        match self.strategy {
            Strategy::Greedy => self.greedy(tracks, detections),
            Strategy::Optimal => self.optimal(tracks, detections),
        }
    }

    fn greedy(&self, tracks: &[BBox<Ltwh>], detections: &[Detection]) -> Association {
        let mut consumed = vec![false; detections.len()];
        let mut matches = Vec::new();

        for (i, tbox) in tracks.iter().enumerate() {
            let mut max_iou = 0.0;
            let mut best = None;

            for (j, det) in detections.iter().enumerate() {
                if consumed[j] {
                    continue;
                }

                let iou = tbox.iou(&det.bbox());
                if iou > max_iou {
                    max_iou = iou;
                    best = Some(j);
                }
            }

            if let Some(j) = best {
                if max_iou > self.threshold {
                    consumed[j] = true;
                    matches.push((i, j));
                }
            }
        }

        Association {
            matches,
            unmatched: unconsumed(&consumed),
        }
    }

    fn optimal(&self, tracks: &[BBox<Ltwh>], detections: &[Detection]) -> Association {
        let ious: Vec<Vec<f32>> = tracks
            .iter()
            .map(|t| detections.iter().map(|d| t.iou(&d.bbox())).collect())
            .collect();

        let n = tracks.len().max(detections.len());
        let mut mat = WeightMatrix::from_fn(n, |(r, c)| {
            if r < tracks.len() && c < detections.len() {
                1.0 - ious[r][c]
            } else {
                1.0
            }
        });

        let positions = match solve_assignment(&mut mat) {
            Ok(positions) => positions,
            Err(err) => {
                tracing::warn!("assignment could not be solved ({:?}), falling back to greedy", err);
                return self.greedy(tracks, detections);
            }
        };

        let mut consumed = vec![false; detections.len()];
        let mut matches: Vec<_> = positions
            .into_iter()
            .filter(|p| p.row < tracks.len() && p.column < detections.len())
            .filter(|p| ious[p.row][p.column] > self.threshold)
            .map(|p| {
                consumed[p.column] = true;
                (p.row, p.column)
            })
            .collect();

        matches.sort_unstable();

        Association {
            matches,
            unmatched: unconsumed(&consumed),
        }
    }
}

fn unconsumed(consumed: &[bool]) -> Vec<usize> {
    consumed
        .iter()
        .enumerate()
        .filter_map(|(idx, &c)| if c { None } else { Some(idx) })
        .collect()
}
