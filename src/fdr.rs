// Fixture difficulty resolution: feed defaults blended with user overrides.
//
// The feed supplies a per-side difficulty on every fixture. Managers who
// disagree with those ratings keep a small keyed override file
// (custom_fdr.json) indexed by opponent name; overrides take precedence
// over the feed default, and the resolved score is always clamped to 1..=5.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::stats::{Fixture, Gameweek, StatSnapshot, Team, TeamId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("failed to read override file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse override file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Override layer
// ---------------------------------------------------------------------------

/// User-set difficulty for facing one opponent, split by the opponent's
/// venue. `home` is how hard the opponent is at their place, `away` how
/// hard they travel. A missing side falls back to the feed default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DifficultyOverride {
    #[serde(rename = "H", skip_serializing_if = "Option::is_none", default)]
    pub home: Option<u8>,
    #[serde(rename = "A", skip_serializing_if = "Option::is_none", default)]
    pub away: Option<u8>,
}

/// Resolves a difficulty score per (team, fixture), blending the feed
/// default with the override layer.
#[derive(Debug, Clone, Default)]
pub struct DifficultyProvider {
    overrides: HashMap<String, DifficultyOverride>,
}

impl DifficultyProvider {
    pub fn new(overrides: HashMap<String, DifficultyOverride>) -> Self {
        Self { overrides }
    }

    /// Load overrides from the keyed JSON record file. A missing file is an
    /// empty override layer, not an error.
    pub fn load(path: &Path) -> Result<Self, OverrideError> {
        if !path.exists() {
            debug!("no FDR override file at {}, using feed defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| OverrideError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let overrides: HashMap<String, DifficultyOverride> =
            serde_json::from_str(&text).map_err(|e| OverrideError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        info!("loaded {} FDR overrides from {}", overrides.len(), path.display());
        Ok(Self { overrides })
    }

    /// Persist the override layer back to its keyed record file.
    pub fn save(&self, path: &Path) -> Result<(), OverrideError> {
        let text =
            serde_json::to_string_pretty(&self.overrides).map_err(|e| OverrideError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        std::fs::write(path, text).map_err(|e| OverrideError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn set_override(&mut self, opponent: &str, value: DifficultyOverride) {
        self.overrides.insert(opponent.to_string(), value);
    }

    pub fn override_for(&self, opponent: &str) -> Option<&DifficultyOverride> {
        self.overrides.get(opponent)
    }

    /// Resolve the difficulty `team` faces in `fixture`.
    ///
    /// Override lookup is keyed by the opponent's name and sided by the
    /// opponent's venue: when `team` is at home the opponent is travelling,
    /// so the opponent's `A` entry applies, and vice versa.
    pub fn resolve(&self, fixture: &Fixture, team: TeamId, teams: &HashMap<TeamId, Team>) -> u8 {
        let default = fixture.default_difficulty_for(team);

        let Some(opponent_id) = fixture.opponent_of(team) else {
            return default;
        };
        let Some(opponent) = teams.get(&opponent_id) else {
            return default;
        };

        let resolved = match self.overrides.get(&opponent.name) {
            Some(entry) => {
                let side = if fixture.is_home_for(team) {
                    entry.away
                } else {
                    entry.home
                };
                side.unwrap_or(default)
            }
            None => default,
        };

        resolved.clamp(1, 5)
    }
}

// ---------------------------------------------------------------------------
// Schedule grid
// ---------------------------------------------------------------------------

/// One upcoming fixture in a team's schedule, with its resolved difficulty.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub gameweek: Gameweek,
    pub opponent: TeamId,
    pub opponent_code: String,
    pub difficulty: u8,
    pub is_home: bool,
}

/// A team's next-N fixture run, sortable by total difficulty.
#[derive(Debug, Clone)]
pub struct TeamSchedule {
    pub team: TeamId,
    pub team_name: String,
    pub entries: Vec<ScheduleEntry>,
    pub total_difficulty: u32,
}

/// Build the per-team upcoming-fixture grid for the next `next_n` gameweeks,
/// resolved through the override layer and sorted by total difficulty
/// (easiest run first; name breaks ties deterministically).
pub fn team_schedules(
    snapshot: &StatSnapshot,
    provider: &DifficultyProvider,
    next_n: u32,
) -> Vec<TeamSchedule> {
    let start = snapshot.next_event.unwrap_or(1);
    let end = start + next_n;

    let mut schedules: Vec<TeamSchedule> = snapshot
        .teams
        .values()
        .map(|team| {
            let mut entries: Vec<ScheduleEntry> = snapshot
                .fixtures
                .iter()
                .filter(|f| {
                    f.involves(team.id)
                        && f.gameweek.is_some_and(|gw| gw >= start && gw < end)
                })
                .map(|f| {
                    let opponent_id = f.opponent_of(team.id).unwrap_or(team.id);
                    let opponent_code = snapshot
                        .team(opponent_id)
                        .map(|t| t.display_code())
                        .unwrap_or_else(|| "???".to_string());
                    ScheduleEntry {
                        gameweek: f.gameweek.unwrap_or(start),
                        opponent: opponent_id,
                        opponent_code,
                        difficulty: provider.resolve(f, team.id, &snapshot.teams),
                        is_home: f.is_home_for(team.id),
                    }
                })
                .collect();
            entries.sort_by_key(|e| e.gameweek);

            let total_difficulty = entries.iter().map(|e| e.difficulty as u32).sum();
            TeamSchedule {
                team: team.id,
                team_name: team.name.clone(),
                entries,
                total_difficulty,
            }
        })
        .collect();

    schedules.sort_by(|a, b| {
        a.total_difficulty
            .cmp(&b.total_difficulty)
            .then_with(|| a.team_name.cmp(&b.team_name))
    });
    schedules
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
