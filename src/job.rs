use serde_derive::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Result of a finished batch analysis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisSummary {
    pub match_id: String,
    pub total_frames: u64,
    pub players_tracked: usize,
    pub report_id: String,
    pub player_metrics_csv: PathBuf,
    pub ball_metrics_csv: PathBuf,
    /// `meters` when calibrated, `pixels` otherwise
    pub units: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LivePlayerMetric {
    pub player_id: u32,
    pub x: f32,
    pub y: f32,
    pub speed_mps: f64,
    pub total_distance_m: f64,
    pub frame: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LiveBallMetric {
    pub x: f32,
    pub y: f32,
    pub frame: u64,
}

/// One message of a job's update stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: f32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<LivePlayerMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ball: Option<LiveBallMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<AnalysisSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub progress: f32,
    pub message: String,
    pub result: Option<AnalysisSummary>,
}

impl Job {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            progress: 0.0,
            message: String::new(),
            result: None,
        }
    }

    /// Moves the job to `status`. Terminal jobs ignore the call and progress
    /// never goes backwards.
    pub fn transition<S: Into<String>>(&mut self, status: JobStatus, progress: f32, message: S) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.status = status;
        self.progress = self.progress.max(progress.clamp(0.0, 1.0));
        self.message = message.into();

        true
    }

    pub fn complete<S: Into<String>>(&mut self, message: S, summary: Option<AnalysisSummary>) -> bool {
        if !self.transition(JobStatus::Completed, 1.0, message) {
            return false;
        }

        self.result = summary;
        true
    }

    #[inline]
    pub fn fail<S: Into<String>>(&mut self, message: S) -> bool {
        self.transition(JobStatus::Failed, self.progress, message)
    }

    #[inline]
    pub fn cancel(&mut self) -> bool {
        self.transition(JobStatus::Cancelled, self.progress, "Analysis cancelled")
    }

    /// Snapshot of the current state as an update message.
    pub fn update(&self) -> JobUpdate {
        JobUpdate {
            job_id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            players: Vec::new(),
            ball: None,
            summary: self.result.clone(),
        }
    }
}

/// Where job updates go. `send` returns `false` once nobody listens anymore.
pub trait UpdateSink {
    fn send(&mut self, update: JobUpdate) -> bool;
}

impl UpdateSink for Vec<JobUpdate> {
    #[inline]
    fn send(&mut self, update: JobUpdate) -> bool {
        self.push(update);
        true
    }
}

impl UpdateSink for crossbeam_channel::Sender<JobUpdate> {
    #[inline]
    fn send(&mut self, update: JobUpdate) -> bool {
        crossbeam_channel::Sender::send(self, update).is_ok()
    }
}

impl<S: UpdateSink + ?Sized> UpdateSink for &mut S {
    #[inline]
    fn send(&mut self, update: JobUpdate) -> bool {
        (**self).send(update)
    }
}

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_is_sticky() {
        let mut job = Job::new("m1");
        assert!(job.transition(JobStatus::Processing, 0.5, "half way"));
        assert!(job.fail("boom"));

        assert!(!job.transition(JobStatus::Processing, 0.9, "late"));
        assert!(!job.complete("done", None));
        assert!(!job.cancel());

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "boom");
        assert_eq!(job.progress, 0.5);
    }

    #[test]
    fn progress_is_monotonic_and_clamped() {
        let mut job = Job::new("m1");
        job.transition(JobStatus::Processing, 0.6, "a");
        job.transition(JobStatus::Processing, 0.4, "b");
        assert_eq!(job.progress, 0.6);

        job.transition(JobStatus::Processing, 7.0, "c");
        assert_eq!(job.progress, 1.0);
    }

    #[test]
    fn status_names_on_the_wire() {
        let mut job = Job::new("m7");
        job.cancel();

        let json = serde_json::to_value(job.update()).unwrap();
        assert_eq!(json["status"], "CANCELLED");
        assert_eq!(json["job_id"], "m7");
        assert!(json.get("players").is_none());
        assert!(json.get("summary").is_none());
    }

    #[test]
    fn channel_sink_reports_disconnect() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = tx;

        assert!(UpdateSink::send(&mut sink, Job::new("a").update()));
        assert_eq!(rx.recv().unwrap().job_id, "a");

        drop(rx);
        assert!(!UpdateSink::send(&mut sink, Job::new("b").update()));
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());

        other.cancel();
        assert!(token.is_cancelled());
    }
}
