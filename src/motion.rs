use nalgebra as na;

const PROCESS_NOISE: f32 = 1e-1;
const MEASUREMENT_NOISE: f32 = 1e-2;
const INITIAL_ERROR: f32 = 1.0;

/// Constant-velocity Kalman filter over `(x, y, vx, vy)` observing position only.
///
/// Construction takes the first measurement, so a filter can never be
/// predicted or corrected before it has a position.
#[derive(Debug, Clone)]
pub struct MotionFilter {
    state: na::Vector4<f32>,
    error_cov: na::Matrix4<f32>,
    transition: na::Matrix4<f32>,
    measurement: na::Matrix2x4<f32>,
    process_noise: na::Matrix4<f32>,
    measurement_noise: na::Matrix2<f32>,
}

impl MotionFilter {
    pub fn new(pt: na::Point2<f32>) -> Self {
        let dt = 1.0;

        Self {
            state: na::Vector4::new(pt.x, pt.y, 0.0, 0.0),
            error_cov: na::Matrix4::identity() * INITIAL_ERROR,
            transition: na::Matrix4::new(
                1.0, 0.0, dt,  0.0,
                0.0, 1.0, 0.0, dt,
                0.0, 0.0, 1.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ),
            measurement: na::Matrix2x4::new(
                1.0, 0.0, 0.0, 0.0,
                0.0, 1.0, 0.0, 0.0,
            ),
            process_noise: na::Matrix4::identity() * PROCESS_NOISE,
            measurement_noise: na::Matrix2::identity() * MEASUREMENT_NOISE,
        }
    }

    /// Advances one time step. The prediction becomes the committed state
    /// until the next correction.
    pub fn predict(&mut self) -> na::Point2<f32> {
        self.state = self.transition * self.state;
        self.error_cov =
            self.transition * self.error_cov * self.transition.transpose() + self.process_noise;

        self.position()
    }

    pub fn correct(&mut self, pt: na::Point2<f32>) -> na::Point2<f32> {
        let z = na::Vector2::new(pt.x, pt.y);
        let innovation = z - self.measurement * self.state;
        let innovation_cov = self.measurement * self.error_cov * self.measurement.transpose()
            + self.measurement_noise;

        match innovation_cov.try_inverse() {
            Some(inv) => {
                let gain = self.error_cov * self.measurement.transpose() * inv;
                self.state += gain * innovation;
                self.error_cov = (na::Matrix4::identity() - gain * self.measurement) * self.error_cov;
            }
            None => {
                self.state.x = pt.x;
                self.state.y = pt.y;
            }
        }

        self.position()
    }

    #[inline]
    pub fn state(&self) -> na::Point2<f32> {
        self.position()
    }

    #[inline]
    pub fn velocity(&self) -> na::Vector2<f32> {
        na::Vector2::new(self.state[2], self.state[3])
    }

    #[inline(always)]
    fn position(&self) -> na::Point2<f32> {
        na::Point2::new(self.state[0], self.state[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_still() {
        let mut kf = MotionFilter::new(na::Point2::new(10.0, 20.0));

        assert_eq!(kf.state(), na::Point2::new(10.0, 20.0));
        assert_eq!(kf.predict(), na::Point2::new(10.0, 20.0));
        assert_eq!(kf.velocity(), na::Vector2::zeros());
    }

    #[test]
    fn correction_pulls_towards_measurement() {
        let mut kf = MotionFilter::new(na::Point2::new(0.0, 0.0));
        kf.predict();
        let pos = kf.correct(na::Point2::new(10.0, 0.0));

        assert!(pos.x > 9.0 && pos.x <= 10.0);
        assert_eq!(kf.state(), pos);
    }

    #[test]
    fn learns_constant_velocity() {
        let mut kf = MotionFilter::new(na::Point2::new(0.0, 0.0));

        for step in 1..=30 {
            kf.predict();
            kf.correct(na::Point2::new(2.0 * step as f32, -1.0 * step as f32));
        }

        let vel = kf.velocity();
        assert!((vel.x - 2.0).abs() < 0.1, "vx = {}", vel.x);
        assert!((vel.y + 1.0).abs() < 0.1, "vy = {}", vel.y);

        let next = kf.predict();
        assert!((next.x - 62.0).abs() < 0.5);
        assert!((next.y + 31.0).abs() < 0.5);
    }
}
