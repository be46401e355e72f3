use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};

use crate::ball::BallTracker;
use crate::calibration::CoordinateMapper;
use crate::config::{AnalysisConfig, EngineConfig};
use crate::detection::ClassFilter;
use crate::detector::{DetectionLogFactory, Detector, DetectorFactory};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::job::{AnalysisSummary, CancelToken, Job, JobStatus, LiveBallMetric, LivePlayerMetric, UpdateSink};
use crate::live::{byte_pipe, FeederGuard, VideoChunk};
use crate::metrics::{MetricsAggregator, Observation, DEFAULT_FPS};
use crate::source::{FrameSource, Y4mSource};
use crate::tracker::PlayerTracker;

/// How a frame loop ended when nothing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    Finished { frames: u64 },
    Cancelled,
}

/// Final state of a job. `error` is set exactly when the job failed.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: Job,
    pub error: Option<Error>,
}

impl JobOutcome {
    pub fn into_result(self) -> Result<Job> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.job),
        }
    }
}

/// What one processed frame produced, in world coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutput {
    pub players: Vec<LivePlayerMetric>,
    pub ball: Option<LiveBallMetric>,
}

/// Per-job tracking state. Lives on one thread for the whole job.
pub struct FramePipeline {
    detector: Box<dyn Detector>,
    filter: ClassFilter,
    mapper: CoordinateMapper,
    players: PlayerTracker,
    ball: BallTracker,
    metrics: MetricsAggregator,
    track_ball: bool,
    team_interval: u64,
    processed: u64,
}

impl FramePipeline {
    pub fn new(
        detector: Box<dyn Detector>,
        filter: ClassFilter,
        mapper: CoordinateMapper,
        players: PlayerTracker,
        track_ball: bool,
        team_interval: u64,
    ) -> Self {
        Self {
            detector,
            filter,
            mapper,
            players,
            ball: BallTracker::new(),
            metrics: MetricsAggregator::new(),
            track_ball,
            team_interval,
            processed: 0,
        }
    }

    pub fn process(&mut self, frame: &Frame, fps: f64) -> Result<FrameOutput> {
        let detections = self.detector.detect(frame)?;
        let (players, balls) = self.filter.split(&detections);

        self.players.update(&players, frame);
        if self.track_ball {
            self.ball.update(&balls);
        }

        self.processed += 1;
        if self.team_interval > 0 && self.processed % self.team_interval == 0 {
            self.players.assign_teams();
        }

        let observations: Vec<_> = self
            .players
            .tracks()
            .into_iter()
            .map(|(id, pixel)| Observation {
                id,
                pixel,
                world: self.mapper.transform(pixel),
            })
            .collect();

        let ball = if self.track_ball {
            self.ball.track().map(|(_, pt)| self.mapper.transform(pt))
        } else {
            None
        };

        let rows = self.metrics.process_frame(
            frame.index,
            fps,
            &observations,
            ball,
            self.players.team_assignments(),
        );

        Ok(FrameOutput {
            players: rows
                .iter()
                .map(|row| LivePlayerMetric {
                    player_id: row.player_id,
                    x: row.position.x,
                    y: row.position.y,
                    speed_mps: row.speed_mps,
                    total_distance_m: row.total_distance_m,
                    frame: row.frame,
                })
                .collect(),
            ball: ball.map(|pt| LiveBallMetric {
                x: pt.x,
                y: pt.y,
                frame: frame.index,
            }),
        })
    }

    #[inline]
    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    #[inline]
    pub fn players(&self) -> &PlayerTracker {
        &self.players
    }

    #[inline]
    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Final team clustering followed by the CSV export.
    pub fn finish(&mut self, dir: &Path) -> Result<crate::metrics::ExportPaths> {
        let teams = self.players.assign_teams().clone();
        self.metrics.export(dir, &teams)
    }
}

/// Reads `source` to the end, processing every `skip_interval`-th frame.
/// `on_frame` sees every frame read and returns `false` to stop early.
pub fn run_frames<S, F>(
    pipeline: &mut FramePipeline,
    source: &mut S,
    skip_interval: u64,
    cancel: &CancelToken,
    mut on_frame: F,
) -> Result<LoopOutcome>
where
    S: FrameSource + ?Sized,
    F: FnMut(u64, Option<&FrameOutput>) -> bool,
{
    let fps = match source.fps() {
        fps if fps > 0.0 => fps,
        _ => DEFAULT_FPS,
    };
    let skip_interval = skip_interval.max(1);

    let mut read = 0u64;
    while let Some(frame) = source.read()? {
        read += 1;

        let output = if (read - 1) % skip_interval == 0 {
            Some(pipeline.process(&frame, fps)?)
        } else {
            None
        };

        if !on_frame(read, output.as_ref()) || cancel.is_cancelled() {
            tracing::info!(frames = read, "analysis cancelled");
            return Ok(LoopOutcome::Cancelled);
        }
    }

    Ok(LoopOutcome::Finished { frames: read })
}

pub struct AnalysisEngine<F: DetectorFactory = DetectionLogFactory> {
    factory: F,
    config: EngineConfig,
}

impl Default for AnalysisEngine<DetectionLogFactory> {
    fn default() -> Self {
        Self::new(DetectionLogFactory, EngineConfig::default())
    }
}

impl<F: DetectorFactory> AnalysisEngine<F> {
    pub fn new(factory: F, config: EngineConfig) -> Self {
        Self { factory, config }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn output_dir(&self, request: &AnalysisConfig) -> PathBuf {
        match &request.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .config
                .output_root
                .join(format!("analysis_{}", request.match_id)),
        }
    }

    fn open_detector(&self, model_path: Option<&PathBuf>) -> Result<Box<dyn Detector>> {
        let path = match model_path {
            Some(p) if !p.as_os_str().is_empty() => p.as_path(),
            _ => self.config.default_model_path.as_path(),
        };

        self.factory.open(path)
    }

    /// Runs a whole-file analysis, reporting through `sink`.
    pub fn analyze_video<S: UpdateSink + ?Sized>(
        &self,
        request: &AnalysisConfig,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> JobOutcome {
        let span = tracing::info_span!("analyze_video", match_id = %request.match_id);
        let _enter = span.enter();

        tracing::info!(video = %request.video_path.display(), "analysis requested");

        let mut job = Job::new(request.match_id.clone());
        job.transition(JobStatus::Pending, 0.0, "Initializing analysis engine...");
        if !sink.send(job.update()) {
            job.cancel();
            return JobOutcome { job, error: None };
        }

        let result = self.run_batch(request, &mut job, sink, cancel);

        finish_job(job, sink, result, |_| String::from("Analysis finished successfully"))
    }

    fn run_batch<S: UpdateSink + ?Sized>(
        &self,
        request: &AnalysisConfig,
        job: &mut Job,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> Result<Finished> {
        request.validate()?;

        let mapper = CoordinateMapper::from_path(request.calibration_path.as_ref());
        let detector = self.open_detector(request.model_path.as_ref())?;

        let output_dir = self.output_dir(request);
        std::fs::create_dir_all(&output_dir)?;

        let mut source = Y4mSource::open(&request.video_path).map_err(|err| match err {
            Error::NotFound(_) => err,
            other => Error::NotFound(format!("{}: {}", request.video_path.display(), other)),
        })?;

        let total = source.frame_count().unwrap_or(0);
        let progress_interval = self.config.progress_interval.max(1);

        let mut pipeline = FramePipeline::new(
            detector,
            ClassFilter::new(request.confidence_threshold),
            mapper,
            PlayerTracker::new(self.config.association),
            request.track_ball,
            request.team_interval,
        );

        let outcome = run_frames(
            &mut pipeline,
            &mut source,
            request.frame_skip_interval,
            cancel,
            |read, _| {
                if read % progress_interval != 0 {
                    return true;
                }

                let progress = if total > 0 {
                    read as f32 / total as f32
                } else {
                    0.0
                };

                job.transition(
                    JobStatus::Processing,
                    progress,
                    format!("Processing frame {}/{}", read, total),
                );
                tracing::debug!(frame = read, total, "progress");

                sink.send(job.update())
            },
        )?;

        let frames = match outcome {
            LoopOutcome::Finished { frames } => frames,
            LoopOutcome::Cancelled => return Ok(Finished::Cancelled),
        };

        let paths = pipeline.finish(&output_dir)?;

        Ok(Finished::Completed(Some(AnalysisSummary {
            match_id: request.match_id.clone(),
            total_frames: frames,
            players_tracked: pipeline.metrics().distinct_players(),
            report_id: format!("report_{}", request.match_id),
            player_metrics_csv: paths.player_metrics,
            ball_metrics_csv: paths.ball_metrics,
            units: pipeline.mapper().units().to_string(),
        }), frames))
    }

    /// Runs a live analysis over chunks pushed by a client. The first chunk
    /// carries the job settings.
    pub fn stream_analysis<S: UpdateSink + ?Sized>(
        &self,
        chunks: Receiver<VideoChunk>,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> JobOutcome {
        let first = match chunks.recv() {
            Ok(chunk) => chunk,
            Err(_) => {
                let err = Error::InvalidArgument("No data received".into());
                let mut job = Job::new(String::new());
                job.fail(err.to_string());
                sink.send(job.update());

                return JobOutcome {
                    job,
                    error: Some(err),
                };
            }
        };

        let span = tracing::info_span!("stream_analysis", match_id = %first.match_id);
        let _enter = span.enter();

        tracing::info!("real-time analysis started");

        let mut job = Job::new(first.match_id.clone());
        job.transition(JobStatus::Pending, 0.0, "Initializing analysis engine...");
        if !sink.send(job.update()) {
            job.cancel();
            return JobOutcome { job, error: None };
        }

        let result = self.run_live(first, chunks, &mut job, sink, cancel);

        finish_job(job, sink, result, |frames| {
            format!("Real-time analysis finished. {} frames processed.", frames)
        })
    }

    fn run_live<S: UpdateSink + ?Sized>(
        &self,
        first: VideoChunk,
        chunks: Receiver<VideoChunk>,
        job: &mut Job,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> Result<Finished> {
        let calibration_path = first.calibration_path.clone();
        let model_path = first.model_path.clone();

        let (pipe, reader) = byte_pipe(self.config.pipe_capacity);
        let feeder = FeederGuard::spawn(first, chunks, pipe)?;

        let mapper = CoordinateMapper::from_path(calibration_path.as_ref());
        let detector = self.open_detector(model_path.as_ref())?;

        let mut source = Y4mSource::from_reader(reader)
            .map_err(|err| Error::Resource(format!("Failed to open video stream: {}", err)))?;

        let mut pipeline = FramePipeline::new(
            detector,
            ClassFilter::new(self.config.live_confidence_threshold),
            mapper,
            PlayerTracker::new(self.config.association),
            true,
            0,
        );

        let update_interval = self.config.live_update_interval.max(1);

        let outcome = run_frames(&mut pipeline, &mut source, 1, cancel, |read, output| {
            let output = match output {
                Some(output) if read % update_interval == 0 => output,
                _ => return true,
            };

            job.transition(JobStatus::Processing, 0.0, format!("Processing frame {}", read));

            let mut update = job.update();
            update.players = output.players.clone();
            update.ball = output.ball.clone();

            sink.send(update)
        })?;

        drop(source);
        let forwarded = feeder.join();
        tracing::debug!(forwarded, "stream drained");

        Ok(match outcome {
            LoopOutcome::Finished { frames } => Finished::Completed(None, frames),
            LoopOutcome::Cancelled => Finished::Cancelled,
        })
    }
}

enum Finished {
    Completed(Option<AnalysisSummary>, u64),
    Cancelled,
}

fn finish_job<S, M>(mut job: Job, sink: &mut S, result: Result<Finished>, message: M) -> JobOutcome
where
    S: UpdateSink + ?Sized,
    M: FnOnce(u64) -> String,
{
    let error = match result {
        Ok(Finished::Completed(summary, frames)) => {
            job.complete(message(frames), summary);
            tracing::info!(frames, "analysis completed");
            None
        }
        Ok(Finished::Cancelled) => {
            job.cancel();
            None
        }
        Err(err) => {
            tracing::error!(%err, "analysis failed");
            job.fail(failure_message(&err));
            Some(err)
        }
    };

    sink.send(job.update());

    JobOutcome { job, error }
}

fn failure_message(err: &Error) -> String {
    match err {
        Error::NotFound(what) => format!("Could not open video file: {}", what),
        Error::ModelUnavailable { .. }
        | Error::InvalidArgument(_)
        | Error::Resource(_)
        | Error::Internal(_) => err.to_string(),
        _ => format!("Internal error: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::detection::{Detection, BALL_CLASS, PLAYER_CLASS};
    use crate::source::MemorySource;

    fn pipeline<D: Detector + 'static>(detector: D) -> FramePipeline {
        FramePipeline::new(
            Box::new(detector),
            ClassFilter::new(0.5),
            CoordinateMapper::Identity,
            PlayerTracker::default(),
            true,
            0,
        )
    }

    fn walking(frame: &Frame) -> Result<Vec<Detection>> {
        let i = frame.index as f32;
        Ok(vec![
            Detection::new(BBox::ltwh(10.0 + i, 10.0, 10.0, 20.0), 0.9, PLAYER_CLASS),
            Detection::new(BBox::ltwh(40.0, 30.0, 4.0, 4.0), 0.9, BALL_CLASS),
        ])
    }

    #[test]
    fn run_frames_processes_every_nth_frame() {
        let mut pipeline = pipeline(walking);
        let mut source = MemorySource::uniform(10.0, 9, 64, 64, [0, 0, 0]);

        let mut seen = Vec::new();
        let outcome = run_frames(&mut pipeline, &mut source, 3, &CancelToken::new(), |read, output| {
            seen.push((read, output.map(|o| o.players.len())));
            true
        })
        .unwrap();

        assert_eq!(outcome, LoopOutcome::Finished { frames: 9 });
        assert_eq!(seen.len(), 9);
        assert_eq!(seen[0], (1, Some(1)));
        assert_eq!(seen[1], (2, None));
        assert_eq!(seen[3], (4, Some(1)));

        let frames: Vec<_> = pipeline.metrics().player_rows().iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![1, 4, 7]);
        assert_eq!(pipeline.metrics().ball_rows().len(), 3);
    }

    #[test]
    fn run_frames_stops_when_callback_declines() {
        let mut pipeline = pipeline(walking);
        let mut source = MemorySource::uniform(10.0, 20, 64, 64, [0, 0, 0]);

        let outcome = run_frames(&mut pipeline, &mut source, 1, &CancelToken::new(), |read, _| read < 5).unwrap();

        assert_eq!(outcome, LoopOutcome::Cancelled);
        assert_eq!(source.frame_count(), Some(20));
        assert_eq!(source.read().unwrap().map(|f| f.index), Some(6));
    }

    #[test]
    fn detector_error_ends_the_loop() {
        let mut pipeline = pipeline(|frame: &Frame| -> Result<Vec<Detection>> {
            match frame.index {
                3 => Err(Error::Internal("detector crashed".into())),
                _ => walking(frame),
            }
        });
        let mut source = MemorySource::uniform(10.0, 5, 64, 64, [0, 0, 0]);

        let err = run_frames(&mut pipeline, &mut source, 1, &CancelToken::new(), |_, _| true).unwrap_err();

        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(pipeline.metrics().player_rows().len(), 2);
    }

    #[test]
    fn internal_failure_message_is_not_prefixed_twice() {
        let msg = failure_message(&Error::Internal("gpu fell over".into()));
        assert_eq!(msg, "Internal error: gpu fell over");

        let msg = failure_message(&Error::NotFound("a.y4m".into()));
        assert_eq!(msg, "Could not open video file: a.y4m");
    }
}
