use crossbeam_channel::{select, Receiver, Sender};
use std::io::{self, Read};
use std::path::PathBuf;
use std::thread::JoinHandle;

use crate::error::{Error, Result};

/// A piece of an encoded video stream pushed by a live client. The first
/// chunk of a stream carries the job settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoChunk {
    pub match_id: String,
    pub data: Vec<u8>,
    pub calibration_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub is_last_chunk: bool,
}

impl VideoChunk {
    pub fn data(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn last(data: Vec<u8>) -> Self {
        Self {
            data,
            is_last_chunk: true,
            ..Default::default()
        }
    }
}

/// Bounded in-process byte pipe. The reader sees end of stream once every
/// sender is gone.
pub fn byte_pipe(capacity: usize) -> (Sender<Vec<u8>>, PipeReader) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (tx, PipeReader::new(rx))
}

#[derive(Debug)]
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
}

impl PipeReader {
    fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            buf: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        while self.pos >= self.buf.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }

        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;

        Ok(n)
    }
}

/// Owns the thread that copies chunk bytes into the pipe. Dropping the guard
/// stops the thread and waits for it.
#[derive(Debug)]
pub struct FeederGuard {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl FeederGuard {
    /// Forwards `first` and then everything from `upstream` until a last
    /// chunk, upstream disconnect, or shutdown.
    pub fn spawn(first: VideoChunk, upstream: Receiver<VideoChunk>, pipe: Sender<Vec<u8>>) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = std::thread::Builder::new()
            .name(format!("feeder-{}", first.match_id))
            .spawn(move || feed(first, upstream, pipe, shutdown_rx))
            .map_err(|err| Error::Resource(format!("cannot start feeder: {}", err)))?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stops the feeder and returns the number of bytes it forwarded.
    pub fn join(mut self) -> u64 {
        self.stop()
    }

    fn stop(&mut self) -> u64 {
        self.shutdown.take();

        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(forwarded)) => forwarded,
            Some(Err(_)) => {
                tracing::error!("feeder thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for FeederGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

fn forward(pipe: &Sender<Vec<u8>>, shutdown: &Receiver<()>, data: Vec<u8>) -> bool {
    if data.is_empty() {
        return true;
    }

    select! {
        send(pipe, data) -> res => res.is_ok(),
        recv(shutdown) -> _ => false,
    }
}

fn feed(first: VideoChunk, upstream: Receiver<VideoChunk>, pipe: Sender<Vec<u8>>, shutdown: Receiver<()>) -> u64 {
    let mut forwarded = first.data.len() as u64;
    let done = first.is_last_chunk;

    if !forward(&pipe, &shutdown, first.data) || done {
        tracing::debug!(forwarded, "feeder finished");
        return forwarded;
    }

    loop {
        select! {
            recv(upstream) -> msg => match msg {
                Ok(chunk) => {
                    let last = chunk.is_last_chunk;
                    let len = chunk.data.len() as u64;

                    if !forward(&pipe, &shutdown, chunk.data) {
                        break;
                    }

                    forwarded += len;
                    if last {
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        }
    }

    tracing::debug!(forwarded, "feeder finished");

    forwarded
}
