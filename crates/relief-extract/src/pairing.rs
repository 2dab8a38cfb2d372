//! Synthesis of a missing dispatch or arrival side from the present side.

use chrono::Duration;
use relief_core::models::{Category, Direction, PointRow, Tier};
use relief_core::settings::PairingConfig;
use tracing::debug;

/// New point rows filling the missing side of each one-sided tier.
///
/// A tier with only SHIP rows gets ARR rows shifted forward by its prior
/// delay; a tier with only ARR rows gets SHIP rows shifted backward, with no
/// lower bound on the resulting dates. Tiers with both sides or neither are
/// left alone. Only fully resolved link rows are considered.
pub fn synthesize_pairs(rows: &[PointRow], config: &PairingConfig) -> Vec<PointRow> {
    let mut out = Vec::new();

    for tier in Tier::ALL {
        let side = |direction: Direction| {
            rows.iter()
                .filter(|r| r.category == Category::link(tier, direction))
                .collect::<Vec<_>>()
        };
        let ship = side(Direction::Ship);
        let arr = side(Direction::Arr);

        let (present, missing, shift) = match (ship.is_empty(), arr.is_empty()) {
            (false, true) => (ship, Direction::Arr, config.prior_delay(tier)),
            (true, false) => (arr, Direction::Ship, -config.prior_delay(tier)),
            _ => continue,
        };

        debug!(
            "Synthesizing {} {} rows for tier {} (shift {} days)",
            present.len(),
            missing.code(),
            tier.code(),
            shift
        );
        out.extend(present.into_iter().map(|r| {
            PointRow::new(
                Category::link(tier, missing),
                r.date + Duration::days(shift),
                r.value * config.scale,
            )
        }));
    }

    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use relief_core::models::LinkLeg;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(1931, m, day).unwrap()
    }

    #[test]
    fn test_ship_only_tier_gets_arrivals() {
        let rows = vec![
            PointRow::new(Category::link(Tier::Pc, Direction::Ship), d(7, 1), 4.0),
            PointRow::new(Category::link(Tier::Pc, Direction::Ship), d(7, 3), 2.0),
        ];
        let out = synthesize_pairs(&rows, &PairingConfig::default());
        assert_eq!(
            out,
            vec![
                PointRow::new(Category::link(Tier::Pc, Direction::Arr), d(7, 8), 4.0),
                PointRow::new(Category::link(Tier::Pc, Direction::Arr), d(7, 10), 2.0),
            ]
        );
    }

    #[test]
    fn test_arr_only_tier_shifts_backward_unbounded() {
        let rows = vec![PointRow::new(
            Category::link(Tier::Zp, Direction::Arr),
            d(1, 3),
            1.0,
        )];
        let out = synthesize_pairs(&rows, &PairingConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, Category::link(Tier::Zp, Direction::Ship));
        assert_eq!(out[0].date, NaiveDate::from_ymd_opt(1930, 12, 24).unwrap());
    }

    #[test]
    fn test_both_sides_present_is_unchanged() {
        let rows = vec![
            PointRow::new(Category::link(Tier::Cv, Direction::Ship), d(7, 1), 1.0),
            PointRow::new(Category::link(Tier::Cv, Direction::Arr), d(7, 9), 1.0),
        ];
        assert!(synthesize_pairs(&rows, &PairingConfig::default()).is_empty());
    }

    #[test]
    fn test_scale_and_fallback_delay() {
        let mut cfg = PairingConfig::default();
        cfg.scale = 0.5;
        cfg.prior_delay_days.insert(Tier::Cv, -2);
        let rows = vec![PointRow::new(
            Category::link(Tier::Cv, Direction::Ship),
            d(7, 1),
            8.0,
        )];
        let out = synthesize_pairs(&rows, &cfg);
        assert_eq!(
            out,
            vec![PointRow::new(Category::link(Tier::Cv, Direction::Arr), d(7, 6), 4.0)]
        );
    }

    #[test]
    fn test_unresolved_and_non_link_rows_ignored() {
        let rows = vec![
            PointRow::new(Category::Link(LinkLeg::new(None, Some(Direction::Ship))), d(7, 1), 1.0),
            PointRow::new(Category::Alloc, d(7, 1), 1.0),
        ];
        assert!(synthesize_pairs(&rows, &PairingConfig::default()).is_empty());
    }
}
