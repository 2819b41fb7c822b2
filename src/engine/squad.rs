// Squad selection under budget, positional-quota, and club-limit constraints.
//
// The selection problem is a multi-constraint knapsack; this module uses the
// deliberate approximation of a greedy efficiency fill followed by bounded
// local repair swaps, not an exact solver. Tie-breaks are total, so the
// result is deterministic for a given pool.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::config::RulesConfig;
use crate::engine::xp::XpTable;
use crate::stats::{Availability, Gameweek, Player, PlayerId, Position, TeamId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SquadError {
    #[error(
        "no squad satisfies the constraints: {reason}; increase the budget or widen the pool"
    )]
    InfeasibleConstraints { reason: String },
}

// ---------------------------------------------------------------------------
// Squad
// ---------------------------------------------------------------------------

/// One squad member, carrying the facts the optimizers need downstream.
/// `xp` is the projected total over the optimization horizon.
#[derive(Debug, Clone)]
pub struct SquadPlayer {
    pub id: PlayerId,
    pub name: String,
    pub team: TeamId,
    pub position: Position,
    pub price: u32,
    pub availability: Availability,
    pub xp: f64,
}

/// The 15 owned players. Immutable once built; re-optimization produces a
/// new `Squad` rather than mutating this one.
#[derive(Debug, Clone)]
pub struct Squad {
    players: Vec<SquadPlayer>,
}

impl Squad {
    /// Build a squad from an explicit selection, enforcing the invariants:
    /// distinct players, exact positional quotas, total price within budget,
    /// and the per-club limit.
    pub fn try_new(players: Vec<SquadPlayer>, rules: &RulesConfig) -> Result<Self, SquadError> {
        let squad = Squad { players };

        for i in 0..squad.players.len() {
            for j in (i + 1)..squad.players.len() {
                if squad.players[i].id == squad.players[j].id {
                    return Err(SquadError::InfeasibleConstraints {
                        reason: format!("player {} appears twice", squad.players[i].id),
                    });
                }
            }
        }

        for pos in Position::all() {
            let want = rules.squad.for_position(pos);
            let got = squad.count_for(pos);
            if got != want {
                return Err(SquadError::InfeasibleConstraints {
                    reason: format!(
                        "{} quota is {want}, selection has {got}",
                        pos.display_str()
                    ),
                });
            }
        }

        if squad.total_price() > rules.budget {
            return Err(SquadError::InfeasibleConstraints {
                reason: format!(
                    "total price {} exceeds budget {}",
                    squad.total_price(),
                    rules.budget
                ),
            });
        }

        for (&team, &count) in &squad.club_counts() {
            if count > rules.club_limit {
                return Err(SquadError::InfeasibleConstraints {
                    reason: format!("club {team} supplies {count} players (limit {})", rules.club_limit),
                });
            }
        }

        Ok(squad)
    }

    /// For squads whose invariants already hold, e.g. rescoring an existing
    /// squad's XP for a different gameweek.
    pub(crate) fn from_validated(players: Vec<SquadPlayer>) -> Self {
        Squad { players }
    }

    pub fn players(&self) -> &[SquadPlayer] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&SquadPlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    pub fn total_price(&self) -> u32 {
        self.players.iter().map(|p| p.price).sum()
    }

    pub fn total_xp(&self) -> f64 {
        self.players.iter().map(|p| p.xp).sum()
    }

    pub fn count_for(&self, pos: Position) -> usize {
        self.players.iter().filter(|p| p.position == pos).count()
    }

    pub fn club_count(&self, team: TeamId) -> usize {
        self.players.iter().filter(|p| p.team == team).count()
    }

    fn club_counts(&self) -> HashMap<TeamId, usize> {
        let mut counts = HashMap::new();
        for p in &self.players {
            *counts.entry(p.team).or_insert(0) += 1;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// A pool candidate annotated with its horizon XP and selection rank.
#[derive(Debug, Clone)]
struct Candidate {
    id: PlayerId,
    name: String,
    team: TeamId,
    position: Position,
    price: u32,
    availability: Availability,
    xp: f64,
    efficiency: f64,
}

impl Candidate {
    fn from_player(player: &Player, xp_table: &XpTable, horizon: &[Gameweek]) -> Self {
        let xp = xp_table.sum_over(player.id, horizon);
        // A zero price never occurs in real data but would make the
        // efficiency ratio meaningless; floor at one price unit.
        let efficiency = xp / player.price.max(1) as f64;
        Candidate {
            id: player.id,
            name: player.name.clone(),
            team: player.team,
            position: player.position,
            price: player.price,
            availability: player.availability,
            xp,
            efficiency,
        }
    }

    fn into_squad_player(self) -> SquadPlayer {
        SquadPlayer {
            id: self.id,
            name: self.name,
            team: self.team,
            position: self.position,
            price: self.price,
            availability: self.availability,
            xp: self.xp,
        }
    }
}

/// Selection order: XP-per-price efficiency, then raw XP, then price
/// headroom (cheaper first), then id. Total, so the fill is deterministic.
fn selection_order(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    b.efficiency
        .partial_cmp(&a.efficiency)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| {
            b.xp.partial_cmp(&a.xp)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .then_with(|| a.price.cmp(&b.price))
        .then_with(|| a.id.cmp(&b.id))
}

/// Choose a full squad from the pool, maximizing horizon XP under the
/// budget, quota, and club-limit rules.
///
/// Approximate by design: a greedy per-position efficiency fill, then up to
/// `2 * pool.len()` repair swaps that each trade the least XP for enough
/// price relief to get under the budget. `InfeasibleConstraints` is raised
/// when a quota cannot be filled at all or the repair budget runs out.
pub fn optimize_squad(
    pool: &[Player],
    xp_table: &XpTable,
    horizon: &[Gameweek],
    rules: &RulesConfig,
) -> Result<Squad, SquadError> {
    // Per-position candidate lists in selection order.
    let mut by_position: HashMap<Position, Vec<Candidate>> = HashMap::new();
    for player in pool {
        by_position
            .entry(player.position)
            .or_default()
            .push(Candidate::from_player(player, xp_table, horizon));
    }
    for candidates in by_position.values_mut() {
        candidates.sort_by(selection_order);
    }

    // Greedy quota fill, tracking per-club counts.
    let mut selected: Vec<Candidate> = Vec::with_capacity(rules.squad.total());
    let mut club_counts: HashMap<TeamId, usize> = HashMap::new();

    for pos in Position::all() {
        let quota = rules.squad.for_position(pos);
        let candidates = by_position.get(&pos).map(Vec::as_slice).unwrap_or(&[]);

        let mut taken = 0;
        for candidate in candidates {
            if taken == quota {
                break;
            }
            let club = club_counts.get(&candidate.team).copied().unwrap_or(0);
            if club >= rules.club_limit {
                continue;
            }
            club_counts.insert(candidate.team, club + 1);
            selected.push(candidate.clone());
            taken += 1;
        }

        if taken < quota {
            return Err(SquadError::InfeasibleConstraints {
                reason: format!(
                    "only {taken} of {quota} {} slots can be filled from the pool",
                    pos.display_str()
                ),
            });
        }
    }

    // Budget repair: swap out the selection whose cheapest feasible
    // same-position downgrade loses the least XP, bounded by pool size.
    let max_iterations = pool.len().saturating_mul(2).max(1);
    let mut iterations = 0;

    while total_price(&selected) > rules.budget {
        if iterations >= max_iterations {
            return Err(SquadError::InfeasibleConstraints {
                reason: format!(
                    "cheapest reachable squad still costs {} against budget {}",
                    total_price(&selected),
                    rules.budget
                ),
            });
        }
        iterations += 1;

        let Some((slot, replacement)) = best_repair_swap(&selected, &by_position, &club_counts, rules)
        else {
            return Err(SquadError::InfeasibleConstraints {
                reason: format!(
                    "no cheaper replacements left; squad costs {} against budget {}",
                    total_price(&selected),
                    rules.budget
                ),
            });
        };

        let outgoing = selected[slot].clone();
        debug!(
            "repair swap: {} ({}) -> {} ({})",
            outgoing.name, outgoing.price, replacement.name, replacement.price
        );
        *club_counts.entry(outgoing.team).or_insert(1) -= 1;
        *club_counts.entry(replacement.team).or_insert(0) += 1;
        selected[slot] = replacement;
    }

    let squad = Squad::try_new(
        selected.into_iter().map(Candidate::into_squad_player).collect(),
        rules,
    )?;

    // Hard invariant, re-checked even though try_new validated: the result
    // must never exceed the budget.
    if squad.total_price() > rules.budget {
        return Err(SquadError::InfeasibleConstraints {
            reason: "post-repair squad exceeds budget".to_string(),
        });
    }

    Ok(squad)
}

fn total_price(selected: &[Candidate]) -> u32 {
    selected.iter().map(|c| c.price).sum()
}

/// Find the (selected slot, replacement) pair that saves money while losing
/// the least XP. Returns `None` when no cost-reducing legal swap exists.
fn best_repair_swap(
    selected: &[Candidate],
    by_position: &HashMap<Position, Vec<Candidate>>,
    club_counts: &HashMap<TeamId, usize>,
    rules: &RulesConfig,
) -> Option<(usize, Candidate)> {
    let mut best: Option<(usize, Candidate, f64)> = None;

    for (slot, current) in selected.iter().enumerate() {
        let candidates = by_position.get(&current.position)?;

        // Cheapest-feasible downgrade for this slot: candidates are in
        // selection order, so the first cheaper legal one loses the least XP
        // among that position's options.
        let replacement = candidates.iter().find(|c| {
            if c.price >= current.price {
                return false;
            }
            if selected.iter().any(|s| s.id == c.id) {
                return false;
            }
            let count = club_counts.get(&c.team).copied().unwrap_or(0)
                - usize::from(c.team == current.team);
            count < rules.club_limit
        });

        if let Some(replacement) = replacement {
            let xp_loss = current.xp - replacement.xp;
            let better = match &best {
                None => true,
                Some((_, best_repl, best_loss)) => {
                    xp_loss < *best_loss - 1e-12
                        || ((xp_loss - *best_loss).abs() <= 1e-12
                            && replacement.price < best_repl.price)
                }
            };
            if better {
                best = Some((slot, replacement.clone(), xp_loss));
            }
        }
    }

    best.map(|(slot, replacement, _)| (slot, replacement))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SquadQuota;
    use crate::stats::{Availability, TrailingForm};

    fn test_rules() -> RulesConfig {
        RulesConfig {
            budget: 1000,
            club_limit: 3,
            squad: SquadQuota {
                gk: 2,
                def: 5,
                mid: 5,
                fwd: 3,
            },
            formations: vec![
                [3, 4, 3],
                [3, 5, 2],
                [4, 3, 3],
                [4, 4, 2],
                [4, 5, 1],
                [5, 3, 2],
                [5, 4, 1],
            ],
        }
    }

    fn pool_player(id: PlayerId, team: TeamId, position: Position, price: u32) -> Player {
        Player {
            id,
            name: format!("Player {id}"),
            team,
            position,
            price,
            form: 5.0,
            points_per_game: 5.0,
            chance_of_playing: None,
            availability: Availability::Available,
            selected_by_percent: 10.0,
            trailing: TrailingForm {
                minutes: 900,
                ..TrailingForm::default()
            },
        }
    }

    /// Build a pool with `n` players per position, spread across clubs, with
    /// XP entries in the table. Club ids cycle so no club dominates.
    fn balanced_pool(xp_table: &mut XpTable) -> Vec<Player> {
        let mut pool = Vec::new();
        let mut id = 1;
        for (pos, n) in [
            (Position::Goalkeeper, 6),
            (Position::Defender, 12),
            (Position::Midfielder, 12),
            (Position::Forward, 8),
        ] {
            for i in 0..n {
                let team = (id % 10) + 1;
                let price = 40 + (i as u32 * 5); // 4.0m upward
                let p = pool_player(id, team, pos, price);
                // Pricier players project a bit better.
                xp_table.insert(id, 10, 3.0 + i as f64 * 0.4);
                pool.push(p);
                id += 1;
            }
        }
        pool
    }

    #[test]
    fn optimize_fills_exact_quotas_within_budget() {
        let mut xp_table = XpTable::default();
        let pool = balanced_pool(&mut xp_table);
        let rules = test_rules();

        let squad = optimize_squad(&pool, &xp_table, &[10], &rules).expect("feasible pool");

        assert_eq!(squad.players().len(), 15);
        assert_eq!(squad.count_for(Position::Goalkeeper), 2);
        assert_eq!(squad.count_for(Position::Defender), 5);
        assert_eq!(squad.count_for(Position::Midfielder), 5);
        assert_eq!(squad.count_for(Position::Forward), 3);
        assert!(squad.total_price() <= rules.budget);
        for team in 1..=10 {
            assert!(squad.club_count(team) <= rules.club_limit);
        }
    }

    #[test]
    fn optimize_is_deterministic() {
        let mut xp_table = XpTable::default();
        let pool = balanced_pool(&mut xp_table);
        let rules = test_rules();

        let a = optimize_squad(&pool, &xp_table, &[10], &rules).unwrap();
        let b = optimize_squad(&pool, &xp_table, &[10], &rules).unwrap();

        assert!((a.total_xp() - b.total_xp()).abs() < 1e-12);
        let mut ids_a: Vec<_> = a.players().iter().map(|p| p.id).collect();
        let mut ids_b: Vec<_> = b.players().iter().map(|p| p.id).collect();
        ids_a.sort_unstable();
        ids_b.sort_unstable();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn too_few_goalkeepers_is_infeasible() {
        let mut xp_table = XpTable::default();
        let mut pool = balanced_pool(&mut xp_table);
        pool.retain(|p| p.position != Position::Goalkeeper || p.id == 1);

        let err = optimize_squad(&pool, &xp_table, &[10], &test_rules()).unwrap_err();
        let SquadError::InfeasibleConstraints { reason } = err;
        assert!(reason.contains("GK"), "reason should name the position: {reason}");
    }

    #[test]
    fn empty_pool_is_infeasible() {
        let xp_table = XpTable::default();
        let err = optimize_squad(&[], &xp_table, &[10], &test_rules()).unwrap_err();
        assert!(matches!(err, SquadError::InfeasibleConstraints { .. }));
    }

    #[test]
    fn budget_repair_downgrades_until_affordable() {
        let mut xp_table = XpTable::default();
        let mut pool = Vec::new();
        let mut id = 1;
        // Two price tiers per position: premium players the greedy pass
        // prefers, plus budget options it must fall back to.
        for (pos, n) in [
            (Position::Goalkeeper, 4),
            (Position::Defender, 10),
            (Position::Midfielder, 10),
            (Position::Forward, 6),
        ] {
            for i in 0..n {
                let premium = i < n / 2;
                let price = if premium { 120 } else { 40 };
                let xp = if premium { 8.0 } else { 4.0 };
                pool.push(pool_player(id, (id % 8) + 1, pos, price));
                xp_table.insert(id, 10, xp);
                id += 1;
            }
        }

        // All-premium costs 15 * 120 = 1800 > 1000; repair must mix tiers.
        let rules = test_rules();
        let squad = optimize_squad(&pool, &xp_table, &[10], &rules).expect("repairable");
        assert!(squad.total_price() <= rules.budget);
        assert_eq!(squad.players().len(), 15);
    }

    #[test]
    fn impossible_budget_is_infeasible() {
        let mut xp_table = XpTable::default();
        let pool = balanced_pool(&mut xp_table);
        let mut rules = test_rules();
        rules.budget = 100; // cheapest possible 15 costs far more

        let err = optimize_squad(&pool, &xp_table, &[10], &rules).unwrap_err();
        let SquadError::InfeasibleConstraints { reason } = err;
        assert!(
            reason.contains("budget"),
            "reason should mention the budget: {reason}"
        );
    }

    #[test]
    fn club_limit_respected_with_stacked_club() {
        let mut xp_table = XpTable::default();
        let mut pool = Vec::new();
        let mut id = 1;
        // Club 1 has the best player at every slot; the limit must cap it.
        for (pos, n) in [
            (Position::Goalkeeper, 6),
            (Position::Defender, 12),
            (Position::Midfielder, 12),
            (Position::Forward, 8),
        ] {
            for i in 0..n {
                let team = if i < 2 { 1 } else { (id % 9) + 2 };
                let xp = if team == 1 { 10.0 } else { 4.0 };
                pool.push(pool_player(id, team, pos, 50));
                xp_table.insert(id, 10, xp);
                id += 1;
            }
        }

        let squad = optimize_squad(&pool, &xp_table, &[10], &test_rules()).unwrap();
        assert_eq!(
            squad.club_count(1),
            3,
            "optimizer should take exactly the club-limit from the stacked club"
        );
    }

    #[test]
    fn goalkeeper_scenario_two_per_club() {
        // Spec scenario: 20 goalkeepers priced 4.0-5.5, at most 2 per club,
        // budget 100.0, club limit 3. The optimizer must take exactly 2 GKs
        // without busting the per-club cap.
        let mut xp_table = XpTable::default();
        let mut pool = Vec::new();
        for i in 0..20u32 {
            let id = i + 1;
            let team = (i / 2) + 1; // 2 GKs per club
            let price = 40 + (i % 4) * 5; // 4.0 .. 5.5
            pool.push(pool_player(id, team, Position::Goalkeeper, price));
            xp_table.insert(id, 10, 3.0 + (i % 7) as f64 * 0.5);
        }
        // Outfield depth from other clubs.
        let mut id = 100;
        for (pos, n) in [
            (Position::Defender, 10),
            (Position::Midfielder, 10),
            (Position::Forward, 6),
        ] {
            for _ in 0..n {
                pool.push(pool_player(id, (id % 8) + 11, pos, 45));
                xp_table.insert(id, 10, 4.0);
                id += 1;
            }
        }

        let squad = optimize_squad(&pool, &xp_table, &[10], &test_rules()).unwrap();
        assert_eq!(squad.count_for(Position::Goalkeeper), 2);
        for team in 1..=10 {
            assert!(squad.club_count(team) <= 3);
        }
        assert!(squad.total_price() <= 1000);
    }

    #[test]
    fn try_new_rejects_duplicate_player() {
        let rules = test_rules();
        let mut players = Vec::new();
        let mut id = 1;
        for (pos, n) in [
            (Position::Goalkeeper, 2),
            (Position::Defender, 5),
            (Position::Midfielder, 5),
            (Position::Forward, 3),
        ] {
            for _ in 0..n {
                players.push(SquadPlayer {
                    id,
                    name: format!("P{id}"),
                    team: (id % 10) + 1,
                    position: pos,
                    price: 50,
                    availability: Availability::Available,
                    xp: 4.0,
                });
                id += 1;
            }
        }
        players[1].id = players[0].id;

        let err = Squad::try_new(players, &rules).unwrap_err();
        let SquadError::InfeasibleConstraints { reason } = err;
        assert!(reason.contains("twice"));
    }

    #[test]
    fn try_new_rejects_wrong_quota() {
        let rules = test_rules();
        // 15 midfielders is the wrong shape.
        let players: Vec<SquadPlayer> = (1..=15)
            .map(|id| SquadPlayer {
                id,
                name: format!("P{id}"),
                team: (id % 10) + 1,
                position: Position::Midfielder,
                price: 50,
                availability: Availability::Available,
                xp: 4.0,
            })
            .collect();

        let err = Squad::try_new(players, &rules).unwrap_err();
        assert!(matches!(err, SquadError::InfeasibleConstraints { .. }));
    }

    #[test]
    fn try_new_rejects_over_budget() {
        let rules = test_rules();
        let mut players = Vec::new();
        let mut id = 1;
        for (pos, n) in [
            (Position::Goalkeeper, 2),
            (Position::Defender, 5),
            (Position::Midfielder, 5),
            (Position::Forward, 3),
        ] {
            for _ in 0..n {
                players.push(SquadPlayer {
                    id,
                    name: format!("P{id}"),
                    team: (id % 10) + 1,
                    position: pos,
                    price: 100, // 15 * 100 = 1500 > 1000
                    availability: Availability::Available,
                    xp: 4.0,
                });
                id += 1;
            }
        }

        let err = Squad::try_new(players, &rules).unwrap_err();
        let SquadError::InfeasibleConstraints { reason } = err;
        assert!(reason.contains("budget"));
    }

    #[test]
    fn tie_break_prefers_higher_xp_then_lower_price() {
        let a = Candidate {
            id: 1,
            name: "A".into(),
            team: 1,
            position: Position::Midfielder,
            price: 50,
            availability: Availability::Available,
            xp: 5.0,
            efficiency: 0.1,
        };
        let mut b = a.clone();
        b.id = 2;
        b.xp = 6.0;
        // Same efficiency, higher raw XP wins.
        assert_eq!(selection_order(&b, &a), std::cmp::Ordering::Less);

        let mut c = a.clone();
        c.id = 3;
        c.price = 40;
        // Same efficiency and XP, cheaper wins.
        assert_eq!(selection_order(&c, &a), std::cmp::Ordering::Less);
    }
}
