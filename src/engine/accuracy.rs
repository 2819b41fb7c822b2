// Backtesting support: compare a table of predictions against realized
// points and report per-gameweek error statistics.

use std::collections::BTreeMap;

use crate::engine::xp::XpTable;
use crate::stats::Gameweek;

/// Error summary for one gameweek. `mean_error` keeps its sign, so a
/// positive value means the model over-predicted on average.
#[derive(Debug, Clone, PartialEq)]
pub struct GameweekAccuracy {
    pub gameweek: Gameweek,
    pub mean_abs_error: f64,
    pub mean_error: f64,
    pub samples: usize,
}

/// Compare predictions with realized points over the keys both tables
/// share. Predictions without an outcome (and outcomes that were never
/// predicted) are ignored rather than scored as zero. Results are sorted
/// by gameweek.
pub fn accuracy_report(predicted: &XpTable, realized: &XpTable) -> Vec<GameweekAccuracy> {
    struct Accumulator {
        abs_sum: f64,
        signed_sum: f64,
        samples: usize,
    }

    let mut by_gameweek: BTreeMap<Gameweek, Accumulator> = BTreeMap::new();

    for (&(player, gw), &prediction) in predicted.iter() {
        let Some(actual) = realized.lookup(player, gw) else {
            continue;
        };
        let error = prediction - actual;
        let acc = by_gameweek.entry(gw).or_insert(Accumulator {
            abs_sum: 0.0,
            signed_sum: 0.0,
            samples: 0,
        });
        acc.abs_sum += error.abs();
        acc.signed_sum += error;
        acc.samples += 1;
    }

    by_gameweek
        .into_iter()
        .map(|(gameweek, acc)| GameweekAccuracy {
            gameweek,
            mean_abs_error: acc.abs_sum / acc.samples as f64,
            mean_error: acc.signed_sum / acc.samples as f64,
            samples: acc.samples,
        })
        .collect()
}

/// Overall mean absolute error across every scored sample, or `None` when
/// the tables share no keys.
pub fn overall_mae(report: &[GameweekAccuracy]) -> Option<f64> {
    let samples: usize = report.iter().map(|r| r.samples).sum();
    if samples == 0 {
        return None;
    }
    let abs_sum: f64 = report
        .iter()
        .map(|r| r.mean_abs_error * r.samples as f64)
        .sum();
    Some(abs_sum / samples as f64)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_gameweek_errors_are_averaged() {
        let mut predicted = XpTable::default();
        let mut realized = XpTable::default();

        predicted.insert(1, 10, 5.0);
        realized.insert(1, 10, 3.0); // error +2
        predicted.insert(2, 10, 4.0);
        realized.insert(2, 10, 6.0); // error -2
        predicted.insert(1, 11, 6.0);
        realized.insert(1, 11, 5.0); // error +1

        let report = accuracy_report(&predicted, &realized);
        assert_eq!(report.len(), 2);

        // GW10: |+2| and |-2| average to 2.0; signed errors cancel.
        assert_eq!(report[0].gameweek, 10);
        assert_eq!(report[0].samples, 2);
        assert!((report[0].mean_abs_error - 2.0).abs() < 1e-9);
        assert!(report[0].mean_error.abs() < 1e-9);

        assert_eq!(report[1].gameweek, 11);
        assert!((report[1].mean_abs_error - 1.0).abs() < 1e-9);
        assert!((report[1].mean_error - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unmatched_keys_are_ignored() {
        let mut predicted = XpTable::default();
        let mut realized = XpTable::default();

        predicted.insert(1, 10, 5.0);
        realized.insert(1, 10, 5.0);
        predicted.insert(2, 10, 9.0); // never played
        realized.insert(3, 10, 7.0); // never predicted

        let report = accuracy_report(&predicted, &realized);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].samples, 1);
        assert!(report[0].mean_abs_error.abs() < 1e-9);
    }

    #[test]
    fn disjoint_tables_produce_empty_report() {
        let mut predicted = XpTable::default();
        let mut realized = XpTable::default();
        predicted.insert(1, 10, 5.0);
        realized.insert(2, 11, 3.0);

        let report = accuracy_report(&predicted, &realized);
        assert!(report.is_empty());
        assert_eq!(overall_mae(&report), None);
    }

    #[test]
    fn overall_mae_weights_by_sample_count() {
        let report = vec![
            GameweekAccuracy {
                gameweek: 10,
                mean_abs_error: 2.0,
                mean_error: 0.0,
                samples: 3,
            },
            GameweekAccuracy {
                gameweek: 11,
                mean_abs_error: 1.0,
                mean_error: 1.0,
                samples: 1,
            },
        ];
        // (2.0 * 3 + 1.0 * 1) / 4 = 1.75
        let mae = overall_mae(&report).unwrap();
        assert!((mae - 1.75).abs() < 1e-9);
    }
}
