// Starting-XI selection: pick the legal formation that maximizes expected
// points, name captain and vice-captain, and order the bench.

use thiserror::Error;

use crate::config::RulesConfig;
use crate::engine::squad::{Squad, SquadPlayer};
use crate::engine::xp::XpTable;
use crate::stats::{Gameweek, PlayerId, Position};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LineupError {
    #[error("no legal formation configured")]
    NoViableFormation,
}

// ---------------------------------------------------------------------------
// Formation
// ---------------------------------------------------------------------------

/// Outfield shape of a starting XI; the goalkeeper slot is implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formation {
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

impl Formation {
    pub fn from_triple(triple: [usize; 3]) -> Self {
        Formation {
            defenders: triple[0],
            midfielders: triple[1],
            forwards: triple[2],
        }
    }

    pub fn starters_for(&self, pos: Position) -> usize {
        match pos {
            Position::Goalkeeper => 1,
            Position::Defender => self.defenders,
            Position::Midfielder => self.midfielders,
            Position::Forward => self.forwards,
        }
    }

    pub fn label(&self) -> String {
        format!("{}-{}-{}", self.defenders, self.midfielders, self.forwards)
    }
}

// ---------------------------------------------------------------------------
// Lineup
// ---------------------------------------------------------------------------

/// A resolved matchday selection. Starters are ordered GK, DEF, MID, FWD and
/// by descending XP within each line; the bench is ordered by descending XP.
#[derive(Debug, Clone)]
pub struct Lineup {
    pub formation: Formation,
    pub starters: Vec<SquadPlayer>,
    pub bench: Vec<SquadPlayer>,
    pub captain: PlayerId,
    pub vice_captain: PlayerId,
}

impl Lineup {
    pub fn starting_xp(&self) -> f64 {
        self.starters.iter().map(|p| p.xp).sum()
    }

    pub fn is_starter(&self, id: PlayerId) -> bool {
        self.starters.iter().any(|p| p.id == id)
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Pick the best starting XI for the squad across the configured formations.
///
/// Candidates within each position are ranked available-first, then by XP,
/// so a ruled-out player only starts when the squad leaves no alternative.
/// Formations are compared first on how many ruled-out players they would
/// force into the XI, then on total XP; exact XP ties go to the more
/// attacking shape (fewer defenders, then more forwards).
pub fn select_lineup(squad: &Squad, rules: &RulesConfig) -> Result<Lineup, LineupError> {
    // Per-position ranking shared by every formation, indexed in the
    // GK, DEF, MID, FWD order that `Position::all` yields.
    let ranked: Vec<Vec<SquadPlayer>> = Position::all()
        .iter()
        .map(|&pos| {
            let mut line: Vec<SquadPlayer> = squad
                .players()
                .iter()
                .filter(|p| p.position == pos)
                .cloned()
                .collect();
            line.sort_by(|a, b| {
                a.availability
                    .is_out()
                    .cmp(&b.availability.is_out())
                    .then_with(|| b.xp.partial_cmp(&a.xp).unwrap_or(std::cmp::Ordering::Equal))
                    .then_with(|| a.id.cmp(&b.id))
            });
            line
        })
        .collect();

    let mut best: Option<(Formation, Vec<SquadPlayer>, usize, f64)> = None;

    for &triple in &rules.formations {
        let formation = Formation::from_triple(triple);
        let mut starters: Vec<SquadPlayer> = Vec::with_capacity(11);
        let mut feasible = true;

        for (idx, &pos) in Position::all().iter().enumerate() {
            let want = formation.starters_for(pos);
            let line = &ranked[idx];
            if line.len() < want {
                feasible = false;
                break;
            }
            starters.extend(line[..want].iter().cloned());
        }
        if !feasible {
            continue;
        }

        let out_count = starters.iter().filter(|p| p.availability.is_out()).count();
        let xp: f64 = starters.iter().map(|p| p.xp).sum();

        let better = match &best {
            None => true,
            Some((best_formation, _, best_out, best_xp)) => {
                if out_count != *best_out {
                    out_count < *best_out
                } else if (xp - *best_xp).abs() > 1e-12 {
                    xp > *best_xp
                } else if formation.defenders != best_formation.defenders {
                    formation.defenders < best_formation.defenders
                } else {
                    formation.forwards > best_formation.forwards
                }
            }
        };
        if better {
            best = Some((formation, starters, out_count, xp));
        }
    }

    let (formation, starters, _, _) = best.ok_or(LineupError::NoViableFormation)?;

    // Captaincy: highest projected score starts, second-highest deputizes.
    let mut by_xp: Vec<&SquadPlayer> = starters.iter().collect();
    by_xp.sort_by(|a, b| {
        b.xp.partial_cmp(&a.xp)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    let captain = by_xp.first().map(|p| p.id).ok_or(LineupError::NoViableFormation)?;
    let vice_captain = by_xp.get(1).map(|p| p.id).unwrap_or(captain);

    let mut bench: Vec<SquadPlayer> = squad
        .players()
        .iter()
        .filter(|p| !starters.iter().any(|s| s.id == p.id))
        .cloned()
        .collect();
    bench.sort_by(|a, b| {
        b.xp.partial_cmp(&a.xp)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    Ok(Lineup {
        formation,
        starters,
        bench,
        captain,
        vice_captain,
    })
}

/// Single-gameweek variant: rescore every squad member from the XP table
/// for `gw`, then select. Lineups for several future gameweeks can be
/// computed independently from one squad this way.
pub fn select_lineup_for(
    squad: &Squad,
    xp_table: &XpTable,
    gw: Gameweek,
    rules: &RulesConfig,
) -> Result<Lineup, LineupError> {
    let rescored: Vec<SquadPlayer> = squad
        .players()
        .iter()
        .map(|p| {
            let mut p = p.clone();
            p.xp = xp_table.get(p.id, gw);
            p
        })
        .collect();
    select_lineup(&Squad::from_validated(rescored), rules)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
