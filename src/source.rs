use ndarray::prelude::*;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};
use crate::frame::Frame;

/// Sequential access to decoded frames. Frames are numbered from 1.
pub trait FrameSource {
    fn fps(&self) -> f64;

    /// Total number of frames when the source knows it up front.
    fn frame_count(&self) -> Option<u64>;

    /// `Ok(None)` at end of stream.
    fn read(&mut self) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn frame_count(&self) -> Option<u64> {
        (**self).frame_count()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        (**self).read()
    }
}

/// YUV4MPEG2 decoder, 8-bit mono, 4:2:0, 4:2:2 and 4:4:4.
pub struct Y4mSource<R: Read> {
    decoder: y4m::Decoder<R>,
    fps: f64,
    frame_count: Option<u64>,
    pending: Option<Frame>,
    next_index: u64,
    /// plane bytes of one decoded frame
    frame_len: usize,
    finished: bool,
}

impl Y4mSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(err),
        })?;

        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut header = Vec::new();
        let header_len = reader.read_until(b'\n', &mut header)? as u64;
        reader.seek(SeekFrom::Start(0))?;

        let mut source = Self::from_reader(reader)?;

        source.frame_count = Some(if source.pending.is_some() {
            file_len.saturating_sub(header_len) / (FRAME_MARKER_LEN + source.frame_len) as u64
        } else {
            0
        });

        tracing::debug!(
            path = %path.display(),
            fps = source.fps,
            frames = ?source.frame_count,
            "video opened"
        );

        Ok(source)
    }
}

impl<R: Read> Y4mSource<R> {
    /// Reads the stream header and the first frame. Blocks until both arrive
    /// or the stream ends.
    pub fn from_reader(reader: R) -> Result<Self> {
        let decoder = y4m::decode(reader)?;

        if decoder.get_bit_depth() != 8 {
            return Err(Error::Video(format!(
                "unsupported bit depth {}",
                decoder.get_bit_depth()
            )));
        }

        let rate = decoder.get_framerate();
        let fps = if rate.den > 0 {
            rate.num as f64 / rate.den as f64
        } else {
            0.0
        };

        let mut source = Self {
            decoder,
            fps,
            frame_count: None,
            pending: None,
            next_index: 1,
            frame_len: 0,
            finished: false,
        };

        source.pending = source.decode_next()?;

        Ok(source)
    }

    fn decode_next(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let width = self.decoder.get_width();
        let height = self.decoder.get_height();

        let pixels = match self.decoder.read_frame() {
            Ok(frame) => {
                let (y, u, v) = (frame.get_y_plane(), frame.get_u_plane(), frame.get_v_plane());
                self.frame_len = y.len() + u.len() + v.len();
                yuv_to_rgb(width, height, y, u, v)?
            }
            Err(y4m::Error::EOF) => {
                self.finished = true;
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let frame = Frame::new(self.next_index, pixels);
        self.next_index += 1;

        Ok(Some(frame))
    }
}

impl<R: Read> FrameSource for Y4mSource<R> {
    #[inline]
    fn fps(&self) -> f64 {
        self.fps
    }

    #[inline]
    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }

        self.decode_next()
    }
}

const FRAME_MARKER_LEN: usize = b"FRAME\n".len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chroma {
    Mono,
    /// chroma plane dimensions
    Planes(usize, usize),
}

fn chroma_layout(width: usize, height: usize, plane_len: usize) -> Option<Chroma> {
    let half_w = (width + 1) / 2;
    let half_h = (height + 1) / 2;

    if plane_len == 0 {
        Some(Chroma::Mono)
    } else if plane_len == width * height {
        Some(Chroma::Planes(width, height))
    } else if plane_len == half_w * height {
        Some(Chroma::Planes(half_w, height))
    } else if plane_len == half_w * half_h {
        Some(Chroma::Planes(half_w, half_h))
    } else {
        None
    }
}

#[inline]
fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// BT.601 studio swing YUV to full range RGB.
fn yuv_to_rgb(
    width: usize,
    height: usize,
    y_plane: &[u8],
    u_plane: &[u8],
    v_plane: &[u8],
) -> Result<Array3<u8>> {
    let chroma = chroma_layout(width, height, u_plane.len())
        .ok_or_else(|| Error::Video(format!("unsupported chroma plane of {} bytes", u_plane.len())))?;

    if y_plane.len() != width * height || u_plane.len() != v_plane.len() {
        return Err(Error::Video("truncated frame".into()));
    }

    let mut data = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        for col in 0..width {
            let y = 1.164 * (y_plane[row * width + col] as f32 - 16.0);

            let (u, v) = match chroma {
                Chroma::Mono => (0.0, 0.0),
                Chroma::Planes(cw, ch) => {
                    let cx = col * cw / width;
                    let cy = row * ch / height;
                    (
                        u_plane[cy * cw + cx] as f32 - 128.0,
                        v_plane[cy * cw + cx] as f32 - 128.0,
                    )
                }
            };

            data.push(clamp_u8(y + 1.596 * v));
            data.push(clamp_u8(y - 0.392 * u - 0.813 * v));
            data.push(clamp_u8(y + 2.017 * u));
        }
    }

    Array3::from_shape_vec((height, width, 3), data).map_err(|err| Error::Internal(err.to_string()))
}

/// Frames held in memory, for synthetic pipelines.
#[derive(Debug, Default)]
pub struct MemorySource {
    fps: f64,
    frames: VecDeque<Frame>,
    total: u64,
}

impl MemorySource {
    pub fn new(fps: f64, frames: Vec<Frame>) -> Self {
        Self {
            fps,
            total: frames.len() as u64,
            frames: frames.into(),
        }
    }

    /// `count` identical frames numbered from 1.
    pub fn uniform(fps: f64, count: u64, cols: usize, rows: usize, rgb: [u8; 3]) -> Self {
        Self::new(
            fps,
            (1..=count)
                .map(|idx| Frame::filled(idx, cols, rows, rgb))
                .collect(),
        )
    }
}

impl FrameSource for MemorySource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.total)
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}
