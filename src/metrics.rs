use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::team::{self, Team, TeamAssignment};

pub const DEFAULT_FPS: f64 = 30.0;

pub const PLAYER_METRICS_FILE: &str = "player_metrics.csv";
pub const BALL_METRICS_FILE: &str = "ball_metrics.csv";

/// One tracked player in one frame, before and after calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub id: u32,
    pub pixel: na::Point2<f32>,
    pub world: na::Point2<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRow {
    pub frame: u64,
    pub player_id: u32,
    pub pixel: na::Point2<f32>,
    pub position: na::Point2<f32>,
    pub team: Team,
    pub speed_mps: f64,
    pub distance_m: f64,
    pub total_distance_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BallRow {
    pub frame: u64,
    pub position: na::Point2<f32>,
}

#[derive(Debug, Clone)]
struct History {
    last_position: na::Point2<f32>,
    last_frame: u64,
    total_distance: f64,
    frames_seen: u64,
}

/// Row layout of the exported player table. Event columns are reserved and
/// always zero until event detection exists.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub frame: u64,
    pub player_id: u32,
    pub x: f32,
    pub y: f32,
    pub team: String,
    pub minutes_played: u64,
    pub shots: u32,
    pub shots_on_target: u32,
    pub passes: u32,
    pub accurate_passes: u32,
    pub tackles: u32,
    pub interceptions: u32,
    pub clearances: u32,
    pub saves: u32,
    pub fouls_committed: u32,
    pub fouls_suffered: u32,
    pub offsides: u32,
    pub distance_meters: f64,
    pub total_distance_meters: f64,
    pub distance_covered_km: f64,
    pub player_xg: f64,
    pub key_passes: u32,
    pub progressive_carries: u32,
    pub press_resistance_success_rate: f64,
    pub defensive_coverage_km: f64,
    pub notes: String,
    pub rating: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BallRecord {
    pub frame: u64,
    pub x: f32,
    pub y: f32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub player_metrics: PathBuf,
    pub ball_metrics: PathBuf,
}

#[derive(Debug)]
pub struct MetricsAggregator {
    players: Vec<PlayerRow>,
    balls: Vec<BallRow>,
    history: BTreeMap<u32, History>,
    fps: f64,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            balls: Vec::new(),
            history: BTreeMap::new(),
            fps: DEFAULT_FPS,
        }
    }

    /// Appends a row per player (and the ball, if tracked) and returns the
    /// player rows added for this frame.
    pub fn process_frame(
        &mut self,
        frame_index: u64,
        fps: f64,
        players: &[Observation],
        ball: Option<na::Point2<f32>>,
        teams: &TeamAssignment,
    ) -> &[PlayerRow] {
        if fps > 0.0 {
            self.fps = fps;
        }

        let first_new = self.players.len();

        for obs in players {
            let mut row = PlayerRow {
                frame: frame_index,
                player_id: obs.id,
                pixel: obs.pixel,
                position: obs.world,
                team: team::label_of(teams, obs.id),
                speed_mps: 0.0,
                distance_m: 0.0,
                total_distance_m: 0.0,
            };

            match self.history.get_mut(&obs.id) {
                Some(h) => {
                    let distance = na::distance(&h.last_position, &obs.world) as f64;
                    let elapsed = (frame_index as f64 - h.last_frame as f64) / self.fps;

                    row.distance_m = distance;
                    if elapsed > 0.0 {
                        row.speed_mps = distance / elapsed;
                    }

                    h.total_distance += distance;
                    h.last_position = obs.world;
                    h.last_frame = frame_index;
                    h.frames_seen += 1;
                    row.total_distance_m = h.total_distance;
                }
                None => {
                    self.history.insert(
                        obs.id,
                        History {
                            last_position: obs.world,
                            last_frame: frame_index,
                            total_distance: 0.0,
                            frames_seen: 1,
                        },
                    );
                }
            }

            self.players.push(row);
        }

        if let Some(position) = ball {
            self.balls.push(BallRow {
                frame: frame_index,
                position,
            });
        }

        &self.players[first_new..]
    }

    #[inline]
    pub fn player_rows(&self) -> &[PlayerRow] {
        &self.players
    }

    #[inline]
    pub fn ball_rows(&self) -> &[BallRow] {
        &self.balls
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn total_distance(&self, id: u32) -> Option<f64> {
        self.history.get(&id).map(|h| h.total_distance)
    }

    pub fn frames_seen(&self, id: u32) -> Option<u64> {
        self.history.get(&id).map(|h| h.frames_seen)
    }

    /// Number of different player ids that produced at least one row.
    #[inline]
    pub fn distinct_players(&self) -> usize {
        self.history.len()
    }

    fn minutes_played(&self, id: u32) -> u64 {
        match self.frames_seen(id) {
            Some(frames) if frames > 0 && self.fps > 0.0 => (frames as f64 / self.fps / 60.0) as u64,
            _ => 0,
        }
    }

    pub fn player_records(&self, final_teams: &TeamAssignment) -> Vec<PlayerRecord> {
        self.players
            .iter()
            .map(|row| {
                let total = self.total_distance(row.player_id).unwrap_or(0.0);
                let team = final_teams.get(&row.player_id).copied().unwrap_or(row.team);

                PlayerRecord {
                    frame: row.frame,
                    player_id: row.player_id,
                    x: row.position.x,
                    y: row.position.y,
                    team: team.to_string(),
                    minutes_played: self.minutes_played(row.player_id),
                    shots: 0,
                    shots_on_target: 0,
                    passes: 0,
                    accurate_passes: 0,
                    tackles: 0,
                    interceptions: 0,
                    clearances: 0,
                    saves: 0,
                    fouls_committed: 0,
                    fouls_suffered: 0,
                    offsides: 0,
                    distance_meters: row.distance_m,
                    total_distance_meters: row.total_distance_m,
                    distance_covered_km: total / 1000.0,
                    player_xg: 0.0,
                    key_passes: 0,
                    progressive_carries: 0,
                    press_resistance_success_rate: 0.0,
                    defensive_coverage_km: 0.0,
                    notes: String::new(),
                    rating: 0.0,
                }
            })
            .collect()
    }

    /// Writes the player and ball tables into `dir`. Labels from `final_teams`
    /// win over the ones recorded while processing.
    pub fn export(&self, dir: &Path, final_teams: &TeamAssignment) -> Result<ExportPaths> {
        let paths = ExportPaths {
            player_metrics: dir.join(PLAYER_METRICS_FILE),
            ball_metrics: dir.join(BALL_METRICS_FILE),
        };

        let mut writer = csv::Writer::from_path(&paths.player_metrics)?;
        let records = self.player_records(final_teams);
        if records.is_empty() {
            writer.write_record(PLAYER_HEADER)?;
        }
        for rec in &records {
            writer.serialize(rec)?;
        }
        writer.flush()?;

        let mut writer = csv::Writer::from_path(&paths.ball_metrics)?;
        if self.balls.is_empty() {
            writer.write_record(["frame", "x", "y"])?;
        }
        for row in &self.balls {
            writer.serialize(BallRecord {
                frame: row.frame,
                x: row.position.x,
                y: row.position.y,
            })?;
        }
        writer.flush()?;

        tracing::info!(
            players = records.len(),
            balls = self.balls.len(),
            dir = %dir.display(),
            "metrics exported"
        );

        Ok(paths)
    }
}

const PLAYER_HEADER: [&str; 27] = [
    "frame",
    "player_id",
    "x",
    "y",
    "team",
    "minutes_played",
    "shots",
    "shots_on_target",
    "passes",
    "accurate_passes",
    "tackles",
    "interceptions",
    "clearances",
    "saves",
    "fouls_committed",
    "fouls_suffered",
    "offsides",
    "distance_meters",
    "total_distance_meters",
    "distance_covered_km",
    "player_xg",
    "key_passes",
    "progressive_carries",
    "press_resistance_success_rate",
    "defensive_coverage_km",
    "notes",
    "rating",
];
