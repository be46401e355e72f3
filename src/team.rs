use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::color::Hsv;
use crate::math;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    #[serde(rename = "Team A")]
    TeamA,
    #[serde(rename = "Team B")]
    TeamB,
    Referee,
    Unknown,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::TeamA => "Team A",
            Team::TeamB => "Team B",
            Team::Referee => "Referee",
            Team::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Track id to label. Absent ids read as `Team::Unknown`.
pub type TeamAssignment = BTreeMap<u32, Team>;

pub fn label_of(teams: &TeamAssignment, id: u32) -> Team {
    teams.get(&id).copied().unwrap_or(Team::Unknown)
}

/// Clusters jersey colors and names the clusters: the two largest are the
/// teams, one small leftover cluster is the referee crew.
#[derive(Debug, Clone)]
pub struct TeamClassifier {
    pub max_clusters: usize,
    pub referee_max_size: usize,
    pub max_iter: usize,
    pub epsilon: f32,
}

impl Default for TeamClassifier {
    fn default() -> Self {
        Self {
            max_clusters: 3,
            referee_max_size: 2,
            max_iter: 10,
            epsilon: 1.0,
        }
    }
}

impl TeamClassifier {
    pub fn assign(&self, samples: &[(u32, Hsv)]) -> TeamAssignment {
        let mut teams = TeamAssignment::new();
        if samples.is_empty() {
            return teams;
        }

        let colors: Vec<Hsv> = samples.iter().map(|(_, c)| *c).collect();
        let k = samples.len().min(self.max_clusters);
        let clustering = math::kmeans(&colors, k, self.max_iter, self.epsilon);

        let mut clusters: Vec<Vec<u32>> = clustering
            .members()
            .into_iter()
            .filter(|m| !m.is_empty())
            .map(|m| m.into_iter().map(|idx| samples[idx].0).collect())
            .collect();

        clusters.sort_by_key(|ids: &Vec<u32>| {
            (
                std::cmp::Reverse(ids.len()),
                ids.iter().copied().min().unwrap_or(u32::MAX),
            )
        });

        let mut has_referee = false;
        for (rank, ids) in clusters.iter().enumerate() {
            let label = match rank {
                0 => Team::TeamA,
                1 => Team::TeamB,
                _ if !has_referee && ids.len() <= self.referee_max_size => {
                    has_referee = true;
                    Team::Referee
                }
                _ => Team::Unknown,
            };

            for &id in ids {
                teams.insert(id, label);
            }
        }

        tracing::debug!(clusters = clusters.len(), tracks = samples.len(), "teams assigned");

        teams
    }
}
