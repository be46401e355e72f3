use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::detection::Detection;
use crate::error::{Error, Result};
use crate::frame::Frame;

/// Produces raw detections (all classes, all confidences) for one frame.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

impl<F> Detector for F
where
    F: FnMut(&Frame) -> Result<Vec<Detection>>,
{
    #[inline]
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self(frame)
    }
}

/// Opens a detector per job from the job's model path.
pub trait DetectorFactory: Send + Sync {
    fn open(&self, model_path: &Path) -> Result<Box<dyn Detector>>;
}

impl<F> DetectorFactory for F
where
    F: Fn(&Path) -> Result<Box<dyn Detector>> + Send + Sync,
{
    #[inline]
    fn open(&self, model_path: &Path) -> Result<Box<dyn Detector>> {
        self(model_path)
    }
}

/// Replays detections recorded ahead of time, one frame per line:
///
/// ```text
/// 1: [{"x":10.0,"y":20.0,"w":30.0,"h":60.0,"p":0.9,"c":0}]
/// 2: []
/// ```
///
/// Frames without a line have no detections.
#[derive(Debug, Default, Clone)]
pub struct DetectionLog {
    frames: BTreeMap<u64, Vec<Detection>>,
}

impl DetectionLog {
    pub fn new(frames: BTreeMap<u64, Vec<Detection>>) -> Self {
        Self { frames }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |reason: String| Error::ModelUnavailable {
            path: path.display().to_string(),
            reason,
        };

        let file = std::fs::File::open(path).map_err(|err| unavailable(err.to_string()))?;
        let mut frames = BTreeMap::new();

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (frame, dets) = Self::parse_line(line)
                .map_err(|reason| unavailable(format!("line {}: {}", line_no + 1, reason)))?;

            frames.insert(frame, dets);
        }

        tracing::debug!(path = %path.display(), frames = frames.len(), "detections log loaded");

        Ok(Self { frames })
    }

    fn parse_line(line: &str) -> std::result::Result<(u64, Vec<Detection>), String> {
        let idx = line.find(':').ok_or_else(|| String::from("expected `:`"))?;
        let (frame, vector) = line.split_at(idx);

        let frame = frame
            .trim()
            .parse::<u64>()
            .map_err(|err| format!("bad frame number: {}", err))?;

        let dets = serde_json::from_str(&vector[1..]).map_err(|err| format!("bad detections: {}", err))?;

        Ok((frame, dets))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for DetectionLog {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        Ok(self.frames.get(&frame.index).cloned().unwrap_or_default())
    }
}

/// Treats the model path as a detections log.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetectionLogFactory;

impl DetectorFactory for DetectionLogFactory {
    fn open(&self, model_path: &Path) -> Result<Box<dyn Detector>> {
        Ok(Box::new(DetectionLog::open(model_path)?))
    }
}
