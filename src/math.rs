use nalgebra as na;

pub type Vec3 = na::Vector3<f32>;

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// cluster index for every input point
    pub labels: Vec<usize>,
    pub centers: Vec<Vec3>,
}

impl Clustering {
    /// Point indices grouped per cluster; empty clusters produce empty groups.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.centers.len()];
        for (idx, &label) in self.labels.iter().enumerate() {
            groups[label].push(idx);
        }

        groups
    }
}

fn nearest(pt: &Vec3, centers: &[Vec3]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;

    for (idx, c) in centers.iter().enumerate() {
        let dist = (pt - c).norm_squared();
        if dist < best_dist {
            best = idx;
            best_dist = dist;
        }
    }

    best
}

/// Deterministic farthest-point seeding: the first point, then repeatedly
/// the point farthest from every chosen center.
fn seed(points: &[Vec3], k: usize) -> Vec<Vec3> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[0]);

    while centers.len() < k {
        let mut far_idx = 0;
        let mut far_dist = -1.0;

        for (idx, pt) in points.iter().enumerate() {
            let dist = centers
                .iter()
                .map(|c| (pt - c).norm_squared())
                .fold(f32::INFINITY, f32::min);

            if dist > far_dist {
                far_idx = idx;
                far_dist = dist;
            }
        }

        centers.push(points[far_idx]);
    }

    centers
}

/// Lloyd's k-means. Stops after `max_iter` rounds or once no center moves
/// by more than `epsilon`. `k` is clamped to the number of points.
pub fn kmeans(points: &[Vec3], k: usize, max_iter: usize, epsilon: f32) -> Clustering {
    let k = k.min(points.len());
    if k == 0 {
        return Clustering {
            labels: Vec::new(),
            centers: Vec::new(),
        };
    }

    let mut centers = seed(points, k);
    let mut labels = vec![0; points.len()];

    for _ in 0..max_iter.max(1) {
        for (label, pt) in labels.iter_mut().zip(points) {
            *label = nearest(pt, &centers);
        }

        let mut sums = vec![Vec3::zeros(); k];
        let mut counts = vec![0usize; k];
        for (&label, pt) in labels.iter().zip(points) {
            sums[label] += pt;
            counts[label] += 1;
        }

        let mut shift = 0.0f32;
        for (idx, center) in centers.iter_mut().enumerate() {
            if counts[idx] == 0 {
                continue;
            }

            let updated = sums[idx] / counts[idx] as f32;
            shift = shift.max((updated - *center).norm());
            *center = updated;
        }

        if shift <= epsilon {
            break;
        }
    }

    for (label, pt) in labels.iter_mut().zip(points) {
        *label = nearest(pt, &centers);
    }

    Clustering { labels, centers }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_cluster_is_the_mean() {
        let pts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 4.0, 6.0),
            Vec3::new(4.0, 8.0, 12.0),
        ];

        let res = kmeans(&pts, 1, 10, 1.0);
        assert_eq!(res.labels, vec![0, 0, 0]);
        assert!((res.centers[0] - Vec3::new(2.0, 4.0, 6.0)).norm() < 1e-5);
    }

    #[test]
    fn separates_distinct_groups() {
        let pts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 100.0, 100.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(101.0, 100.0, 100.0),
        ];

        let res = kmeans(&pts, 2, 10, 1.0);
        assert_eq!(res.labels[0], res.labels[2]);
        assert_eq!(res.labels[1], res.labels[3]);
        assert_ne!(res.labels[0], res.labels[1]);
    }

    #[test]
    fn k_is_clamped_and_empty_input_is_fine() {
        assert!(kmeans(&[], 3, 10, 1.0).centers.is_empty());

        let res = kmeans(&[Vec3::new(1.0, 1.0, 1.0)], 3, 10, 1.0);
        assert_eq!(res.centers.len(), 1);
        assert_eq!(res.members(), vec![vec![0]]);
    }
}
