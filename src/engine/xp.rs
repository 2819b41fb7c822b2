// Expected-points (XP) model.
//
// Converts a player's trailing-window form and the fixture list into a
// predicted score per (player, gameweek). Pure and deterministic: the same
// snapshot, provider, and model config always produce the same table. There
// is no error path — missing optional inputs degrade to priors, never fail.

use std::collections::HashMap;

use crate::config::ModelConfig;
use crate::fdr::DifficultyProvider;
use crate::stats::{Gameweek, Player, PlayerId, Position, StatSnapshot, Team};

// ---------------------------------------------------------------------------
// Scoring table
// ---------------------------------------------------------------------------

// Per-position point values used to turn trailing-window counts into a
// per-90 productivity rate. These mirror the game's scoring rules, not the
// tunable model weights.

const ASSIST_POINTS: f64 = 3.0;
const APPEARANCE_POINTS_PER_90: f64 = 2.0;
const YELLOW_CARD_POINTS: f64 = -1.0;
const RED_CARD_POINTS: f64 = -3.0;

fn goal_points(pos: Position) -> f64 {
    match pos {
        Position::Goalkeeper | Position::Defender => 6.0,
        Position::Midfielder => 5.0,
        Position::Forward => 4.0,
    }
}

fn clean_sheet_points(pos: Position) -> f64 {
    match pos {
        Position::Goalkeeper | Position::Defender => 4.0,
        Position::Midfielder => 1.0,
        Position::Forward => 0.0,
    }
}

// ---------------------------------------------------------------------------
// XP table
// ---------------------------------------------------------------------------

/// Batch XP output keyed by (player, gameweek). Derived and cacheable;
/// recomputed whenever the snapshot or overrides change, never persisted.
#[derive(Debug, Clone, Default)]
pub struct XpTable {
    values: HashMap<(PlayerId, Gameweek), f64>,
}

impl XpTable {
    /// The XP for a (player, gameweek) pair; absent entries score zero.
    pub fn get(&self, player: PlayerId, gw: Gameweek) -> f64 {
        self.values.get(&(player, gw)).copied().unwrap_or(0.0)
    }

    /// Like [`get`](Self::get), but distinguishes "absent" from "zero".
    pub fn lookup(&self, player: PlayerId, gw: Gameweek) -> Option<f64> {
        self.values.get(&(player, gw)).copied()
    }

    pub fn insert(&mut self, player: PlayerId, gw: Gameweek, xp: f64) {
        self.values.insert((player, gw), xp);
    }

    /// Sum of a player's XP across a gameweek range.
    pub fn sum_over(&self, player: PlayerId, gws: &[Gameweek]) -> f64 {
        gws.iter().map(|&gw| self.get(player, gw)).sum()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(PlayerId, Gameweek), &f64)> {
        self.values.iter()
    }
}

// ---------------------------------------------------------------------------
// Model components
// ---------------------------------------------------------------------------

/// Trailing-window productivity in points per 90 minutes played.
///
/// Appearance points are credited at the flat per-90 rate rather than per
/// match, since the window only records total minutes. Returns zero for a
/// player with no minutes (the prior takes over in that case).
pub fn points_per_90(player: &Player) -> f64 {
    let minutes = player.trailing.minutes;
    if minutes == 0 {
        return 0.0;
    }

    let t = &player.trailing;
    let produced = t.goals as f64 * goal_points(player.position)
        + t.assists as f64 * ASSIST_POINTS
        + t.clean_sheets as f64 * clean_sheet_points(player.position)
        + t.bonus as f64
        + t.yellow_cards as f64 * YELLOW_CARD_POINTS
        + t.red_cards as f64 * RED_CARD_POINTS;

    let per90 = produced / minutes as f64 * 90.0 + APPEARANCE_POINTS_PER_90;
    per90.max(0.0)
}

/// Per-gameweek base rate before fixture and appearance adjustments.
///
/// A weighted blend of recent form, season points-per-game, and per-90
/// productivity. Players with no recorded minutes get the per-position
/// prior instead, so new signings still receive a score.
pub fn base_rate(player: &Player, model: &ModelConfig) -> f64 {
    if player.trailing.minutes == 0 {
        return model.priors.for_position(player.position);
    }

    let weight_sum = model.form_weight + model.ppg_weight + model.per90_weight;
    let blended = model.form_weight * player.form
        + model.ppg_weight * player.points_per_game
        + model.per90_weight * points_per_90(player);
    (blended / weight_sum).max(0.0)
}

/// Probability-like factor in [0, 1] that the player actually takes the
/// pitch: availability flag scaled by the recent-minutes trend.
pub fn appearance_factor(player: &Player, model: &ModelConfig) -> f64 {
    if player.availability.is_out() {
        return 0.0;
    }

    let chance = match player.chance_of_playing {
        Some(c) => c.min(100),
        None if player.availability == crate::stats::Availability::Doubtful => {
            model.doubtful_default_chance
        }
        None => 100,
    };
    let probability = chance as f64 / 100.0;

    let minutes_factor = if player.trailing.recent_minutes.is_empty() {
        1.0
    } else {
        let total: u32 = player
            .trailing
            .recent_minutes
            .iter()
            .map(|&m| m as u32)
            .sum();
        let avg = total as f64 / player.trailing.recent_minutes.len() as f64;
        (avg / 90.0).clamp(0.0, 1.0)
    };

    probability * minutes_factor
}

/// Difficulty multiplier: easier fixtures score above 1, harder below.
fn fixture_multiplier(difficulty: u8, model: &ModelConfig) -> f64 {
    1.0 + (3.0 - difficulty as f64) * model.fdr_step
}

// Cutoffs on the feed's team-strength scale (roughly 1000-1350).
const WEAK_STRENGTH: u32 = 1050;
const STRONG_STRENGTH: u32 = 1250;

/// Strength-rating matchup adjustment for one fixture, 1 ± `strength_swing`.
///
/// Defensive players (GK/DEF) are matched against the opponent's attack
/// rating with their own club's defence rating; attacking players (MID/FWD)
/// against the opponent's defence with their own club's attack. A weak
/// opponent only helps when the player's own side can exploit it, and a
/// strong opponent only hurts when the player's own side cannot match it.
pub fn matchup_multiplier(
    player: &Player,
    own: &Team,
    opponent: &Team,
    model: &ModelConfig,
) -> f64 {
    let (own_strength, opponent_strength) = match player.position {
        Position::Goalkeeper | Position::Defender => {
            (own.strength_defence, opponent.strength_attack)
        }
        Position::Midfielder | Position::Forward => {
            (own.strength_attack, opponent.strength_defence)
        }
    };

    if opponent_strength < WEAK_STRENGTH {
        if own_strength < WEAK_STRENGTH {
            1.0
        } else {
            1.0 + model.strength_swing
        }
    } else if own_strength > STRONG_STRENGTH {
        1.0
    } else {
        1.0 - model.strength_swing
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Expected points for one player in one gameweek.
///
/// Double gameweeks sum the per-fixture contributions; a blank gameweek or
/// an unavailable player scores zero. Always >= 0.
pub fn compute_xp(
    player: &Player,
    gw: Gameweek,
    snapshot: &StatSnapshot,
    provider: &DifficultyProvider,
    model: &ModelConfig,
) -> f64 {
    let appearance = appearance_factor(player, model);
    if appearance <= 0.0 {
        return 0.0;
    }

    let fixtures = snapshot.fixtures_for(player.team, gw);
    if fixtures.is_empty() {
        return 0.0;
    }

    let base = base_rate(player, model);

    let per_fixture: f64 = fixtures
        .iter()
        .map(|f| {
            let difficulty = provider.resolve(f, player.team, &snapshot.teams);
            let venue = if f.is_home_for(player.team) {
                model.home_multiplier
            } else {
                model.away_multiplier
            };
            // Unknown teams degrade to a neutral matchup, never an error.
            let matchup = match (
                snapshot.team(player.team),
                f.opponent_of(player.team).and_then(|id| snapshot.team(id)),
            ) {
                (Some(own), Some(opponent)) => matchup_multiplier(player, own, opponent, model),
                _ => 1.0,
            };
            base * fixture_multiplier(difficulty, model) * venue * matchup
        })
        .sum();

    (per_fixture * appearance).max(0.0)
}

/// Batch form: XP for every given player across every given gameweek.
pub fn compute_xp_for_all(
    players: &[Player],
    gws: &[Gameweek],
    snapshot: &StatSnapshot,
    provider: &DifficultyProvider,
    model: &ModelConfig,
) -> XpTable {
    let mut table = XpTable::default();
    for player in players {
        for &gw in gws {
            table.insert(player.id, gw, compute_xp(player, gw, snapshot, provider, model));
        }
    }
    table
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
