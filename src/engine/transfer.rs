// Single-transfer advisor: rank the legal replacements for one squad member
// by projected points gained over the planning horizon.

use thiserror::Error;
use tracing::debug;

use crate::config::RulesConfig;
use crate::engine::squad::{Squad, SquadPlayer};
use crate::engine::xp::XpTable;
use crate::stats::{Gameweek, Player, PlayerId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("player {player} is not in the squad")]
    NotInSquad { player: PlayerId },
    #[error("no legal replacement for {player}: every candidate is owned, unaffordable, or blocked by the club limit")]
    NoLegalReplacement { player: String },
}

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

/// One candidate swap. `gain` is the incoming player's XP minus the
/// outgoing player's, both summed over the caller's horizon (the outgoing
/// side is rescored from the table, not taken from the squad-build value).
/// A negative gain is still reported when the caller asks about a player
/// with no upgrades (the least-bad option comes first).
#[derive(Debug, Clone)]
pub struct TransferProposal {
    pub outgoing: SquadPlayer,
    pub incoming: SquadPlayer,
    pub gain: f64,
}

/// Rank every legal replacement for `out_id`, best first.
///
/// A replacement is legal when it plays the same position, is not already
/// owned, is not ruled out, fits the budget headroom left by the sale, and
/// keeps the incoming club within the club limit once the outgoing player's
/// own club slot is released. Ordering is by descending gain, then lower
/// price, then id.
pub fn suggest_transfers(
    squad: &Squad,
    out_id: PlayerId,
    pool: &[Player],
    xp_table: &XpTable,
    horizon: &[Gameweek],
    rules: &RulesConfig,
) -> Result<impl Iterator<Item = TransferProposal>, TransferError> {
    let mut outgoing = squad
        .player(out_id)
        .cloned()
        .ok_or(TransferError::NotInSquad { player: out_id })?;
    // The squad stores XP over the horizon it was optimized for; the gain
    // must compare both sides over the horizon given here.
    outgoing.xp = xp_table.sum_over(out_id, horizon);

    // Money in the bank plus the sale price caps what can come in.
    let headroom = rules.budget.saturating_sub(squad.total_price());
    let max_price = outgoing.price + headroom;

    let mut proposals: Vec<TransferProposal> = pool
        .iter()
        .filter(|candidate| {
            if candidate.position != outgoing.position {
                return false;
            }
            if squad.contains(candidate.id) {
                return false;
            }
            if candidate.availability.is_out() {
                return false;
            }
            if candidate.price > max_price {
                return false;
            }
            // The outgoing player's club slot frees up before the incoming
            // player's counts.
            let club_after = squad.club_count(candidate.team)
                - usize::from(candidate.team == outgoing.team)
                + 1;
            club_after <= rules.club_limit
        })
        .map(|candidate| {
            let xp = xp_table.sum_over(candidate.id, horizon);
            TransferProposal {
                outgoing: outgoing.clone(),
                incoming: SquadPlayer {
                    id: candidate.id,
                    name: candidate.name.clone(),
                    team: candidate.team,
                    position: candidate.position,
                    price: candidate.price,
                    availability: candidate.availability,
                    xp,
                },
                gain: xp - outgoing.xp,
            }
        })
        .collect();

    if proposals.is_empty() {
        return Err(TransferError::NoLegalReplacement {
            player: outgoing.name,
        });
    }

    proposals.sort_by(|a, b| {
        b.gain
            .partial_cmp(&a.gain)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.incoming.price.cmp(&b.incoming.price))
            .then_with(|| a.incoming.id.cmp(&b.incoming.id))
    });

    debug!(
        "{} legal replacements for {} (max price {})",
        proposals.len(),
        proposals[0].outgoing.name,
        max_price
    );

    Ok(proposals.into_iter())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SquadQuota;
    use crate::stats::{Availability, Position, TrailingForm};

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
            formations: vec![[3, 4, 3], [4, 4, 2]],
        }
    }

    fn member(id: PlayerId, team: u32, position: Position, price: u32, xp: f64) -> SquadPlayer {
        SquadPlayer {
            id,
            name: format!("Player {id}"),
            team,
            position,
            price,
            availability: Availability::Available,
            xp,
        }
    }

    fn pool_player(id: PlayerId, team: u32, position: Position, price: u32) -> Player {
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

    /// Squad costing 980 against the 1000 budget, leaving 2.0m headroom.
    /// The weak defender (id 3, 5.0m, 1.0 XP) is the transfer target.
    fn test_squad() -> Squad {
        let mut players = Vec::new();
        players.push(member(1, 1, Position::Goalkeeper, 55, 4.0));
        players.push(member(2, 2, Position::Goalkeeper, 40, 2.0));
        players.push(member(3, 3, Position::Defender, 50, 1.0));
        for id in 4..=7 {
            players.push(member(id, id, Position::Defender, 55, 3.0));
        }
        for id in 8..=12 {
            players.push(member(id, id - 4, Position::Midfielder, 75, 4.5));
        }
        for id in 13..=15 {
            players.push(member(id, id - 9, Position::Forward, 80, 5.0));
        }
        let squad = Squad::try_new(players, &test_rules()).expect("valid test squad");
        assert_eq!(squad.total_price(), 980);
        squad
    }

    #[test]
    fn affordable_upgrades_ranked_by_gain() {
        let squad = test_squad();
        let mut xp_table = XpTable::default();
        xp_table.insert(3, 10, 1.0); // outgoing defender's horizon XP
        // Defender candidates: 6.5m is within 5.0 + 2.0 headroom, 7.5m is not.
        let pool = vec![
            pool_player(20, 15, Position::Defender, 65),
            pool_player(21, 16, Position::Defender, 55),
            pool_player(22, 17, Position::Defender, 75),
        ];
        xp_table.insert(20, 10, 6.0);
        xp_table.insert(21, 10, 4.0);
        xp_table.insert(22, 10, 9.0);

        let proposals: Vec<_> =
            suggest_transfers(&squad, 3, &pool, &xp_table, &[10], &test_rules())
                .unwrap()
                .collect();

        let ids: Vec<_> = proposals.iter().map(|p| p.incoming.id).collect();
        assert_eq!(ids, vec![20, 21], "7.5m defender exceeds the price cap");
        assert!((proposals[0].gain - 5.0).abs() < 1e-9); // 6.0 - 1.0
        assert!((proposals[1].gain - 3.0).abs() < 1e-9);
    }

    #[test]
    fn owned_players_are_not_suggested() {
        let squad = test_squad();
        let xp_table = XpTable::default();
        // Candidate 4 is already in the squad.
        let pool = vec![
            pool_player(4, 4, Position::Defender, 55),
            pool_player(30, 15, Position::Defender, 50),
        ];

        let proposals: Vec<_> =
            suggest_transfers(&squad, 3, &pool, &xp_table, &[10], &test_rules())
                .unwrap()
                .collect();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].incoming.id, 30);
    }

    #[test]
    fn club_limit_blocks_a_fourth_player() {
        let squad = test_squad();
        let xp_table = XpTable::default();
        // Club 4 already supplies 3 players (a defender, a midfielder, and a
        // forward), so another signing from it is illegal.
        assert_eq!(squad.club_count(4), 3);
        let pool = vec![
            pool_player(40, 4, Position::Defender, 50),
            pool_player(41, 15, Position::Defender, 50),
        ];

        let proposals: Vec<_> =
            suggest_transfers(&squad, 3, &pool, &xp_table, &[10], &test_rules())
                .unwrap()
                .collect();
        let ids: Vec<_> = proposals.iter().map(|p| p.incoming.id).collect();
        assert_eq!(ids, vec![41]);
    }

    #[test]
    fn selling_releases_the_outgoing_club_slot() {
        let squad = test_squad();
        let xp_table = XpTable::default();
        // Club 3 only supplies the outgoing defender, so a same-club
        // replacement is fine; make club 3 fully stacked first.
        assert_eq!(squad.club_count(3), 1);
        let pool = vec![pool_player(50, 3, Position::Defender, 50)];

        let proposals: Vec<_> =
            suggest_transfers(&squad, 3, &pool, &xp_table, &[10], &test_rules())
                .unwrap()
                .collect();
        assert_eq!(proposals[0].incoming.id, 50);
    }

    #[test]
    fn ruled_out_candidates_are_skipped() {
        let squad = test_squad();
        let xp_table = XpTable::default();
        let mut injured = pool_player(60, 15, Position::Defender, 50);
        injured.availability = Availability::Injured;
        let pool = vec![injured, pool_player(61, 16, Position::Defender, 50)];

        let proposals: Vec<_> =
            suggest_transfers(&squad, 3, &pool, &xp_table, &[10], &test_rules())
                .unwrap()
                .collect();
        let ids: Vec<_> = proposals.iter().map(|p| p.incoming.id).collect();
        assert_eq!(ids, vec![61]);
    }

    #[test]
    fn gain_is_scored_over_the_given_horizon() {
        // The squad was built with 1.0 stored for the outgoing defender, but
        // over gameweek 30 they project 10.0; the gain must use the latter.
        let squad = test_squad();
        let mut xp_table = XpTable::default();
        xp_table.insert(3, 30, 10.0);
        let pool = vec![pool_player(90, 15, Position::Defender, 50)];
        xp_table.insert(90, 30, 6.0);

        let proposals: Vec<_> =
            suggest_transfers(&squad, 3, &pool, &xp_table, &[30], &test_rules())
                .unwrap()
                .collect();
        assert!((proposals[0].outgoing.xp - 10.0).abs() < 1e-9);
        assert!((proposals[0].gain - (-4.0)).abs() < 1e-9); // 6.0 - 10.0
    }

    #[test]
    fn no_candidates_is_an_error() {
        let squad = test_squad();
        let xp_table = XpTable::default();
        // Only a wrong-position candidate available.
        let pool = vec![pool_player(70, 15, Position::Midfielder, 50)];

        let err = suggest_transfers(&squad, 3, &pool, &xp_table, &[10], &test_rules())
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, TransferError::NoLegalReplacement { .. }));
    }

    #[test]
    fn unknown_player_is_an_error() {
        let squad = test_squad();
        let xp_table = XpTable::default();
        let err = suggest_transfers(&squad, 999, &[], &xp_table, &[10], &test_rules())
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, TransferError::NotInSquad { player: 999 }));
    }

    #[test]
    fn downgrade_is_reported_with_negative_gain() {
        let squad = test_squad();
        let mut xp_table = XpTable::default();
        xp_table.insert(3, 10, 1.0);
        let pool = vec![pool_player(80, 15, Position::Defender, 40)];
        xp_table.insert(80, 10, 0.5);

        let proposals: Vec<_> =
            suggest_transfers(&squad, 3, &pool, &xp_table, &[10], &test_rules())
                .unwrap()
                .collect();
        assert!((proposals[0].gain - (-0.5)).abs() < 1e-9); // 0.5 - 1.0
    }
}
