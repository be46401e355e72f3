#![allow(dead_code)]

use std::path::Path;

use pitchtrack::bbox::BBox;
use pitchtrack::detection::{BALL_CLASS, PLAYER_CLASS};
use pitchtrack::detector::{Detector, DetectorFactory};
use pitchtrack::error::{Error, Result};
use pitchtrack::job::{JobUpdate, UpdateSink};
use pitchtrack::{CancelToken, Detection, Frame, JobStatus};

pub const WIDTH: usize = 320;
pub const HEIGHT: usize = 240;

/// Uniform gray 4:2:0 stream at 30 fps.
pub fn y4m_bytes(frames: usize) -> Vec<u8> {
    let mut out = format!("YUV4MPEG2 W{} H{} F30:1 Ip A1:1 C420jpeg\n", WIDTH, HEIGHT).into_bytes();
    let chroma = (WIDTH / 2) * (HEIGHT / 2);

    for _ in 0..frames {
        out.extend_from_slice(b"FRAME\n");
        out.extend(std::iter::repeat(126u8).take(WIDTH * HEIGHT));
        out.extend(std::iter::repeat(128u8).take(2 * chroma));
    }

    out
}

pub fn write_video(dir: &Path, frames: usize) -> std::path::PathBuf {
    let path = dir.join("match.y4m");
    std::fs::write(&path, y4m_bytes(frames)).unwrap();
    path
}

/// Two players walking towards each other, a ball, and a low confidence
/// person that the confidence floor drops.
pub fn scene(index: u64) -> Vec<Detection> {
    let i = index as f32;

    vec![
        Detection::new(BBox::ltwh(20.0 + i, 50.0, 20.0, 40.0), 0.9, PLAYER_CLASS),
        Detection::new(BBox::ltwh(200.0 - i, 100.0, 20.0, 40.0), 0.85, PLAYER_CLASS),
        Detection::new(BBox::ltwh(100.0 + 2.0 * i, 150.0, 8.0, 8.0), 0.8, BALL_CLASS),
        Detection::new(BBox::ltwh(280.0, 10.0, 20.0, 40.0), 0.2, PLAYER_CLASS),
    ]
}

pub fn scripted() -> impl DetectorFactory {
    |_: &Path| -> Result<Box<dyn Detector>> {
        Ok(Box::new(|frame: &Frame| -> Result<Vec<Detection>> { Ok(scene(frame.index)) }))
    }
}

/// Like `scripted`, but the detector fails on frame `fail_at`.
pub fn failing_at(fail_at: u64) -> impl DetectorFactory {
    move |_: &Path| -> Result<Box<dyn Detector>> {
        Ok(Box::new(move |frame: &Frame| -> Result<Vec<Detection>> {
            if frame.index == fail_at {
                return Err(Error::Internal("detector crashed".into()));
            }

            Ok(scene(frame.index))
        }))
    }
}

/// Records updates and cancels the job on its first progress report.
pub struct CancelOnProgress {
    pub updates: Vec<JobUpdate>,
    pub token: CancelToken,
}

impl UpdateSink for CancelOnProgress {
    fn send(&mut self, update: JobUpdate) -> bool {
        if update.status == JobStatus::Processing {
            self.token.cancel();
        }

        self.updates.push(update);
        true
    }
}

/// Accepts `remaining` updates, then reports the receiver as gone.
pub struct Hangup {
    pub remaining: usize,
}

impl UpdateSink for Hangup {
    fn send(&mut self, _update: JobUpdate) -> bool {
        if self.remaining == 0 {
            return false;
        }

        self.remaining -= 1;
        true
    }
}
