use nalgebra as na;
use serde_derive::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Deserialize, Debug)]
struct CalibrationFile {
    homography_matrix: Vec<f64>,
}

/// Image plane to pitch plane projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(na::Matrix3<f64>);

impl Homography {
    pub fn new(matrix: na::Matrix3<f64>) -> Self {
        Self(matrix)
    }

    /// Reads `homography_matrix`, nine numbers in row-major order.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::Calibration(format!("{}: {}", path.display(), err)))?;

        let file: CalibrationFile = serde_yaml::from_str(&text)
            .map_err(|err| Error::Calibration(format!("{}: {}", path.display(), err)))?;

        if file.homography_matrix.len() != 9 {
            return Err(Error::Calibration(format!(
                "{}: homography_matrix has {} values, expected 9",
                path.display(),
                file.homography_matrix.len()
            )));
        }

        Ok(Self(na::Matrix3::from_row_slice(&file.homography_matrix)))
    }

    #[inline]
    pub fn matrix(&self) -> &na::Matrix3<f64> {
        &self.0
    }

    /// Points that project to infinity map to the origin.
    pub fn transform(&self, pt: na::Point2<f32>) -> na::Point2<f32> {
        let v = self.0 * na::Vector3::new(pt.x as f64, pt.y as f64, 1.0);

        if v.z.abs() <= f64::EPSILON {
            return na::Point2::origin();
        }

        na::Point2::new((v.x / v.z) as f32, (v.y / v.z) as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateMapper {
    /// positions stay in pixels
    Identity,
    Homography(Homography),
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        CoordinateMapper::Identity
    }
}

impl CoordinateMapper {
    /// Loads a calibration file. Any failure is logged and leaves the mapper
    /// uncalibrated.
    pub fn from_path<P: AsRef<Path>>(path: Option<P>) -> Self {
        let path = match path {
            Some(p) => p,
            None => {
                tracing::warn!("no calibration given, metrics stay in pixel units");
                return CoordinateMapper::Identity;
            }
        };

        match Homography::load(path) {
            Ok(h) => CoordinateMapper::Homography(h),
            Err(err) => {
                tracing::warn!(%err, "calibration failed, metrics stay in pixel units");
                CoordinateMapper::Identity
            }
        }
    }

    #[inline]
    pub fn transform(&self, pt: na::Point2<f32>) -> na::Point2<f32> {
        match self {
            CoordinateMapper::Identity => pt,
            CoordinateMapper::Homography(h) => h.transform(pt),
        }
    }

    #[inline]
    pub fn is_calibrated(&self) -> bool {
        matches!(self, CoordinateMapper::Homography(_))
    }

    pub fn units(&self) -> &'static str {
        if self.is_calibrated() {
            "meters"
        } else {
            "pixels"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_row_major_matrix() {
        let file = write_yaml("homography_matrix: [0.5, 0, 10, 0, 0.25, 20, 0, 0, 1]\n");
        let mapper = CoordinateMapper::from_path(Some(file.path()));

        assert!(mapper.is_calibrated());
        assert_eq!(mapper.units(), "meters");
        assert_eq!(
            mapper.transform(na::Point2::new(100.0, 40.0)),
            na::Point2::new(60.0, 30.0)
        );
    }

    #[test]
    fn projective_division() {
        let h = Homography::new(na::Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0));
        assert_eq!(h.transform(na::Point2::new(4.0, 6.0)), na::Point2::new(2.0, 3.0));

        let h = Homography::new(na::Matrix3::zeros());
        assert_eq!(h.transform(na::Point2::new(4.0, 6.0)), na::Point2::origin());
    }

    #[test]
    fn wrong_length_is_calibration_error() {
        let file = write_yaml("homography_matrix: [1, 0, 0, 0, 1, 0]\n");
        assert!(matches!(Homography::load(file.path()), Err(Error::Calibration(_))));
    }

    #[test]
    fn missing_file_falls_back_to_identity() {
        let mapper = CoordinateMapper::from_path(Some("/nonexistent/calibration.yaml"));
        assert!(!mapper.is_calibrated());
        assert_eq!(mapper.units(), "pixels");

        let pt = na::Point2::new(12.5, 7.0);
        assert_eq!(mapper.transform(pt), pt);
    }

    #[test]
    fn malformed_yaml_falls_back_to_identity() {
        let file = write_yaml("homography_matrix: not-a-list\n");
        assert_eq!(
            CoordinateMapper::from_path(Some(file.path())),
            CoordinateMapper::Identity
        );
        assert_eq!(CoordinateMapper::from_path(None::<&str>), CoordinateMapper::Identity);
    }
}
