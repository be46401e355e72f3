pub mod associator;
pub mod ball;
pub mod bbox;
pub mod calibration;
pub mod color;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame;
pub mod job;
pub mod live;
pub mod math;
pub mod metrics;
pub mod motion;
pub mod orchestrator;
pub mod source;
pub mod team;
pub mod tracker;

mod track;

pub use ball::BallTracker;
pub use config::{AnalysisConfig, EngineConfig};
pub use detection::Detection;
pub use error::Error;
pub use frame::Frame;
pub use job::{CancelToken, Job, JobStatus, JobUpdate};
pub use live::VideoChunk;
pub use metrics::MetricsAggregator;
pub use orchestrator::{AnalysisEngine, JobOutcome};
pub use team::{Team, TeamAssignment};
pub use track::{Track, TrackState};
pub use tracker::PlayerTracker;
