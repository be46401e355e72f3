use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::associator::Strategy;
use crate::error::{Error, Result};

/// One batch analysis request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub match_id: String,
    pub video_path: PathBuf,
    pub calibration_path: Option<PathBuf>,
    /// detector source, the engine default when empty
    pub model_path: Option<PathBuf>,
    /// `<output_root>/analysis_<match_id>` when absent
    pub output_dir: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub track_ball: bool,
    pub frame_skip_interval: u64,
    /// re-cluster team colors every this many processed frames, 0 to only
    /// cluster once at the end
    pub team_interval: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            match_id: String::new(),
            video_path: PathBuf::new(),
            calibration_path: None,
            model_path: None,
            output_dir: None,
            confidence_threshold: 0.5,
            track_ball: true,
            frame_skip_interval: 1,
            team_interval: 0,
        }
    }
}

impl AnalysisConfig {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(match_id: S, video_path: P) -> Self {
        Self {
            match_id: match_id.into(),
            video_path: video_path.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.match_id.is_empty() {
            return Err(Error::InvalidArgument("match id is empty".into()));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::InvalidArgument(format!(
                "confidence threshold {} is outside [0, 1]",
                self.confidence_threshold
            )));
        }

        Ok(())
    }
}

/// Settings shared by every job an engine runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub output_root: PathBuf,
    pub default_model_path: PathBuf,
    pub association: Strategy,
    /// batch progress is reported every this many frames
    pub progress_interval: u64,
    /// live metrics are reported every this many frames
    pub live_update_interval: u64,
    pub live_confidence_threshold: f32,
    /// byte chunks buffered between the live feeder and the decoder
    pub pipe_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_root: std::env::temp_dir(),
            default_model_path: PathBuf::from("detections.dets"),
            association: Strategy::Greedy,
            progress_interval: 30,
            live_update_interval: 5,
            live_confidence_threshold: 0.5,
            pipe_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: EngineConfig =
            serde_yaml::from_str("association: optimal\nprogress_interval: 10\n").unwrap();

        assert_eq!(config.association, Strategy::Optimal);
        assert_eq!(config.progress_interval, 10);
        assert_eq!(config.live_update_interval, 5);
        assert_eq!(config.pipe_capacity, 64);
    }

    #[test]
    fn request_defaults() {
        let request = AnalysisConfig::new("m1", "match.y4m");
        assert_eq!(request.confidence_threshold, 0.5);
        assert!(request.track_ball);
        assert_eq!(request.frame_skip_interval, 1);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn rejects_bad_requests() {
        assert!(AnalysisConfig::default().validate().is_err());

        let mut request = AnalysisConfig::new("m1", "match.y4m");
        request.confidence_threshold = 1.5;
        assert!(matches!(request.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn loads_engine_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "output_root: /data/out\npipe_capacity: 8\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.output_root, PathBuf::from("/data/out"));
        assert_eq!(config.pipe_capacity, 8);
        assert_eq!(config.association, Strategy::Greedy);
    }
}
