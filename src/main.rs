use anyhow::Context;
use clap::Parser;
use std::io::{Read, Write};
use std::path::PathBuf;

use pitchtrack::associator::Strategy;
use pitchtrack::job::UpdateSink;
use pitchtrack::{AnalysisConfig, AnalysisEngine, CancelToken, EngineConfig, JobOutcome, JobUpdate, VideoChunk};

/// Player and ball tracking, team assignment and movement metrics for match footage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input video (YUV4MPEG2)
    #[arg(long)]
    video: PathBuf,

    /// Calibration file with a `homography_matrix`
    #[arg(long)]
    calib: Option<PathBuf>,

    /// Detections log replayed as detector output
    #[arg(long)]
    model: Option<PathBuf>,

    /// Directory for the metric tables
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Detection confidence floor
    #[arg(long, default_value_t = 0.5)]
    conf: f32,

    /// Skip ball tracking
    #[arg(long)]
    no_ball: bool,

    /// Process every n-th frame
    #[arg(long, default_value_t = 1)]
    skip_frames: u64,

    #[arg(long, default_value = "local")]
    match_id: String,

    /// Re-cluster teams every n processed frames (0 only at the end)
    #[arg(long, default_value_t = 0)]
    team_interval: u64,

    /// Use Hungarian instead of greedy association
    #[arg(long)]
    optimal_association: bool,

    /// Engine settings (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Push the video through the live path in chunks
    #[arg(long)]
    live: bool,

    #[arg(long, default_value_t = 64 * 1024)]
    chunk_size: usize,
}

/// Prints every update as one JSON line.
struct JsonLines<W: Write>(W);

impl<W: Write> UpdateSink for JsonLines<W> {
    fn send(&mut self, update: JobUpdate) -> bool {
        match serde_json::to_string(&update) {
            Ok(line) => writeln!(self.0, "{}", line).is_ok(),
            Err(err) => {
                tracing::error!(%err, "cannot encode update");
                false
            }
        }
    }
}

fn feed_chunks(args: &Args, tx: crossbeam_channel::Sender<VideoChunk>) -> anyhow::Result<()> {
    let mut file = std::fs::File::open(&args.video)
        .with_context(|| format!("cannot open {}", args.video.display()))?;

    let mut first = true;
    loop {
        let mut data = vec![0u8; args.chunk_size.max(1)];
        let n = file.read(&mut data)?;
        data.truncate(n);

        let mut chunk = VideoChunk::data(data);
        chunk.is_last_chunk = n == 0;

        if first {
            chunk.match_id = args.match_id.clone();
            chunk.calibration_path = args.calib.clone();
            chunk.model_path = args.model.clone();
            first = false;
        }

        if tx.send(chunk).is_err() || n == 0 {
            break;
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("cannot load {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if args.optimal_association {
        config.association = Strategy::Optimal;
    }
    config.live_confidence_threshold = args.conf;

    let engine = AnalysisEngine::new(pitchtrack::detector::DetectionLogFactory, config);
    let cancel = CancelToken::new();
    let mut sink = JsonLines(std::io::stdout());

    let outcome: JobOutcome = if args.live {
        let (tx, rx) = crossbeam_channel::bounded(16);

        std::thread::scope(|scope| {
            let feeder = scope.spawn(|| feed_chunks(&args, tx));
            let outcome = engine.stream_analysis(rx, &mut sink, &cancel);

            if let Ok(Err(err)) = feeder.join() {
                tracing::warn!(%err, "chunk reader stopped");
            }

            outcome
        })
    } else {
        let request = AnalysisConfig {
            match_id: args.match_id.clone(),
            video_path: args.video.clone(),
            calibration_path: args.calib.clone(),
            model_path: args.model.clone(),
            output_dir: args.output_dir.clone(),
            confidence_threshold: args.conf,
            track_ball: !args.no_ball,
            frame_skip_interval: args.skip_frames,
            team_interval: args.team_interval,
        };

        engine.analyze_video(&request, &mut sink, &cancel)
    };

    let job = outcome.into_result()?;
    tracing::info!(status = ?job.status, "{}", job.message);

    Ok(())
}
