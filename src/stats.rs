// Typed season snapshot: players, teams, fixtures.
//
// This is the validation boundary for the upstream stat feed. The feed hands
// over loosely-structured JSON; everything past this module works with the
// strongly-typed entities below. Unrecognized position or status codes are
// rejected here, never coerced inside the XP model or the optimizers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PlayerId = u32;
pub type TeamId = u32;
pub type Gameweek = u32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("player `{player}` has unrecognized position code {code}")]
    UnknownPosition { player: String, code: u8 },

    #[error("player `{player}` has unrecognized status code `{code}`")]
    UnknownStatus { player: String, code: String },

    #[error("player `{player}` references unknown team id {team}")]
    UnknownTeam { player: String, team: TeamId },

    #[error("player `{player}` has unparseable numeric field `{field}`: `{value}`")]
    BadNumber {
        player: String,
        field: &'static str,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// The four playing positions. Immutable for a player within a season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    /// Map the feed's `element_type` code (1..=4) to a position.
    pub fn from_element_type(code: u8) -> Option<Self> {
        match code {
            1 => Some(Position::Goalkeeper),
            2 => Some(Position::Defender),
            3 => Some(Position::Midfielder),
            4 => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }

    /// All positions in squad-sheet order (GK first).
    pub fn all() -> [Position; 4] {
        [
            Position::Goalkeeper,
            Position::Defender,
            Position::Midfielder,
            Position::Forward,
        ]
    }

    /// Deterministic ordering index (GK < DEF < MID < FWD).
    pub fn sort_order(&self) -> u8 {
        match self {
            Position::Goalkeeper => 0,
            Position::Defender => 1,
            Position::Midfielder => 2,
            Position::Forward => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// Player availability flag, from the feed's one-letter status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Doubtful,
    Injured,
    Suspended,
    Unavailable,
}

impl Availability {
    /// Parse the feed status code: `a` available, `d` doubtful, `i` injured,
    /// `s` suspended, `u`/`n` unavailable (left club / not in squad).
    pub fn from_status_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(Availability::Available),
            "d" => Some(Availability::Doubtful),
            "i" => Some(Availability::Injured),
            "s" => Some(Availability::Suspended),
            "u" | "n" => Some(Availability::Unavailable),
            _ => None,
        }
    }

    /// Whether the player cannot take the pitch at all this gameweek.
    pub fn is_out(&self) -> bool {
        matches!(
            self,
            Availability::Injured | Availability::Suspended | Availability::Unavailable
        )
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Trailing-window form counters for one player.
///
/// `recent_minutes` holds per-match minutes for the most recent matches when
/// the feed supplied them (newest last); it may be empty, in which case the
/// appearance model falls back to treating the player as a regular starter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrailingForm {
    pub minutes: u32,
    pub recent_minutes: Vec<u16>,
    pub goals: u32,
    pub assists: u32,
    pub clean_sheets: u32,
    pub bonus: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team: TeamId,
    pub position: Position,
    /// Current price in tenths of a million (e.g. 55 = 5.5m). Supplied by the
    /// feed; the engine never computes price changes.
    pub price: u32,
    pub form: f64,
    pub points_per_game: f64,
    /// Percentage chance of playing the next round, when flagged.
    pub chance_of_playing: Option<u8>,
    pub availability: Availability,
    pub selected_by_percent: f64,
    pub trailing: TrailingForm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub short_name: String,
    pub strength_attack: u32,
    pub strength_defence: u32,
}

impl Team {
    /// Three-letter display code: the feed's short name when present,
    /// otherwise the first three letters of the name, uppercased.
    pub fn display_code(&self) -> String {
        if !self.short_name.is_empty() {
            return self.short_name.clone();
        }
        self.name.chars().take(3).collect::<String>().to_uppercase()
    }
}

/// One scheduled match. `gameweek` is `None` for postponed fixtures that have
/// not yet been rescheduled; those never contribute to any gameweek's XP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub home: TeamId,
    pub away: TeamId,
    pub gameweek: Option<Gameweek>,
    /// Feed-default difficulty for the home side, 1..=5 (lower = easier).
    pub home_difficulty: u8,
    /// Feed-default difficulty for the away side, 1..=5.
    pub away_difficulty: u8,
}

impl Fixture {
    pub fn involves(&self, team: TeamId) -> bool {
        self.home == team || self.away == team
    }

    pub fn is_home_for(&self, team: TeamId) -> bool {
        self.home == team
    }

    pub fn opponent_of(&self, team: TeamId) -> Option<TeamId> {
        if self.home == team {
            Some(self.away)
        } else if self.away == team {
            Some(self.home)
        } else {
            None
        }
    }

    /// The feed-default difficulty for the given side of this fixture.
    pub fn default_difficulty_for(&self, team: TeamId) -> u8 {
        if self.is_home_for(team) {
            self.home_difficulty
        } else {
            self.away_difficulty
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable in-memory snapshot of the season state. A refresh builds a new
/// snapshot; nothing mutates one in place.
#[derive(Debug, Clone)]
pub struct StatSnapshot {
    pub players: Vec<Player>,
    pub teams: HashMap<TeamId, Team>,
    pub fixtures: Vec<Fixture>,
    /// The next unfinished gameweek, when the feed declared one.
    pub next_event: Option<Gameweek>,
    pub fetched_at: DateTime<Utc>,
}

impl StatSnapshot {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    /// All fixtures for `team` in `gw`. Zero entries is a blank gameweek,
    /// two or more a double gameweek; both are valid.
    pub fn fixtures_for(&self, team: TeamId, gw: Gameweek) -> Vec<&Fixture> {
        self.fixtures
            .iter()
            .filter(|f| f.gameweek == Some(gw) && f.involves(team))
            .collect()
    }

    /// Validate and convert the raw feed payload into the typed model.
    pub fn from_raw(
        bootstrap: RawBootstrap,
        raw_fixtures: Vec<RawFixture>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotError> {
        let teams: HashMap<TeamId, Team> = bootstrap
            .teams
            .into_iter()
            .map(|t| {
                (
                    t.id,
                    Team {
                        id: t.id,
                        name: t.name,
                        short_name: t.short_name,
                        strength_attack: t.strength_attack_home,
                        strength_defence: t.strength_defence_home,
                    },
                )
            })
            .collect();

        let mut players = Vec::with_capacity(bootstrap.elements.len());
        for e in bootstrap.elements {
            let position = Position::from_element_type(e.element_type).ok_or_else(|| {
                SnapshotError::UnknownPosition {
                    player: e.web_name.clone(),
                    code: e.element_type,
                }
            })?;
            let availability = Availability::from_status_code(&e.status).ok_or_else(|| {
                SnapshotError::UnknownStatus {
                    player: e.web_name.clone(),
                    code: e.status.clone(),
                }
            })?;
            if !teams.contains_key(&e.team) {
                return Err(SnapshotError::UnknownTeam {
                    player: e.web_name,
                    team: e.team,
                });
            }

            let form = parse_feed_number(&e.form, "form", &e.web_name)?;
            let points_per_game =
                parse_feed_number(&e.points_per_game, "points_per_game", &e.web_name)?;
            let selected_by_percent = parse_feed_number(
                &e.selected_by_percent,
                "selected_by_percent",
                &e.web_name,
            )?;

            players.push(Player {
                id: e.id,
                name: e.web_name,
                team: e.team,
                position,
                price: e.now_cost,
                form,
                points_per_game,
                chance_of_playing: e.chance_of_playing_next_round,
                availability,
                selected_by_percent,
                trailing: TrailingForm {
                    minutes: e.minutes,
                    recent_minutes: Vec::new(),
                    goals: e.goals_scored,
                    assists: e.assists,
                    clean_sheets: e.clean_sheets,
                    bonus: e.bonus,
                    yellow_cards: e.yellow_cards,
                    red_cards: e.red_cards,
                },
            });
        }

        let fixtures = raw_fixtures
            .into_iter()
            .map(|f| Fixture {
                home: f.team_h,
                away: f.team_a,
                gameweek: f.event,
                home_difficulty: f.team_h_difficulty.unwrap_or(3).clamp(1, 5),
                away_difficulty: f.team_a_difficulty.unwrap_or(3).clamp(1, 5),
            })
            .collect();

        // Prefer the feed's explicit "next" marker; otherwise the first
        // unfinished event; otherwise none (pre-season payloads).
        let next_event = bootstrap
            .events
            .iter()
            .find(|e| e.is_next)
            .or_else(|| bootstrap.events.iter().find(|e| !e.finished))
            .map(|e| e.id);

        Ok(StatSnapshot {
            players,
            teams,
            fixtures,
            next_event,
            fetched_at,
        })
    }

    /// Fold per-player match history (minutes, newest last) into the
    /// trailing windows. Applied while the snapshot is still being
    /// assembled by the feed, before it is shared.
    pub fn with_recent_minutes(mut self, mut histories: HashMap<PlayerId, Vec<u16>>) -> Self {
        for player in &mut self.players {
            if let Some(minutes) = histories.remove(&player.id) {
                player.trailing.recent_minutes = minutes;
            }
        }
        self
    }
}

/// The feed serializes several numeric fields as strings ("4.5"). An empty
/// string means zero; anything else unparseable is rejected.
fn parse_feed_number(
    value: &str,
    field: &'static str,
    player: &str,
) -> Result<f64, SnapshotError> {
    if value.is_empty() {
        return Ok(0.0);
    }
    value.parse::<f64>().map_err(|_| SnapshotError::BadNumber {
        player: player.to_string(),
        field,
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Raw feed payload structs
// ---------------------------------------------------------------------------

/// The feed's `bootstrap-static` payload, trimmed to the fields we consume.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBootstrap {
    pub events: Vec<RawEvent>,
    pub teams: Vec<RawTeam>,
    pub elements: Vec<RawElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: Gameweek,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub is_next: bool,
    #[serde(default)]
    pub finished: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTeam {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub strength_attack_home: u32,
    #[serde(default)]
    pub strength_defence_home: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawElement {
    pub id: PlayerId,
    pub web_name: String,
    pub team: TeamId,
    pub element_type: u8,
    pub now_cost: u32,
    pub status: String,
    #[serde(default)]
    pub form: String,
    #[serde(default)]
    pub points_per_game: String,
    #[serde(default)]
    pub chance_of_playing_next_round: Option<u8>,
    #[serde(default)]
    pub selected_by_percent: String,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub goals_scored: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default)]
    pub clean_sheets: u32,
    #[serde(default)]
    pub bonus: u32,
    #[serde(default)]
    pub yellow_cards: u32,
    #[serde(default)]
    pub red_cards: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFixture {
    pub team_h: TeamId,
    pub team_a: TeamId,
    #[serde(default)]
    pub event: Option<Gameweek>,
    #[serde(default)]
    pub team_h_difficulty: Option<u8>,
    #[serde(default)]
    pub team_a_difficulty: Option<u8>,
}

/// The feed's per-player `element-summary` payload, trimmed to the match
/// history the trailing window consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct RawElementSummary {
    #[serde(default)]
    pub history: Vec<RawHistoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHistoryEntry {
    pub round: Gameweek,
    #[serde(default)]
    pub minutes: u16,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
