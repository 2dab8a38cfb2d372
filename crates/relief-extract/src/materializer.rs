//! Turns a classified row's date set and value into dated point rows.

use chrono::{Duration, NaiveDate};
use relief_core::models::{Category, Direction, MaterializeMode, PointRow};
use relief_core::settings::RangeMode;

/// Range policy and endpoint splitting, taken from the run config.
#[derive(Debug, Clone, Copy)]
pub struct MaterializeOptions {
    pub range_mode: RangeMode,
    pub split_endpoints: bool,
}

/// Point rows for one evidence row plus what the audit log records about them.
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub points: Vec<PointRow>,
    pub mode: MaterializeMode,
    /// `first~last` for spreads, comma-joined dates otherwise.
    pub date_or_range: String,
}

fn with_direction(category: Category, direction: Direction) -> Category {
    match category {
        Category::Link(leg) => Category::Link(leg.with_direction(direction)),
        other => other,
    }
}

fn splits(category: Category, split_endpoints: bool) -> bool {
    split_endpoints && category.is_link()
}

/// Materialize `value` over `dates` (sorted, distinct) under `category`.
///
/// Breach rows always take the endpoint branch. An empty date set yields
/// no points and [`MaterializeMode::NoDate`].
pub fn materialize(
    category: Category,
    dates: &[NaiveDate],
    value: f64,
    options: MaterializeOptions,
) -> Materialized {
    let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
        return Materialized {
            points: Vec::new(),
            mode: MaterializeMode::NoDate,
            date_or_range: String::new(),
        };
    };

    let uniform = options.range_mode == RangeMode::Uniform
        && dates.len() >= 2
        && category != Category::Breach;

    if uniform {
        let days = ((last - first).num_days() + 1).max(1);
        let per_day = value / days as f64;
        let date_or_range = format!("{first}~{last}");
        let span = (0..days).map(|i| first + Duration::days(i));

        if days >= 2 && splits(category, options.split_endpoints) {
            let points = span
                .map(|day| {
                    let cat = if day == first {
                        with_direction(category, Direction::Ship)
                    } else if day == last {
                        with_direction(category, Direction::Arr)
                    } else {
                        category
                    };
                    PointRow::new(cat, day, per_day)
                })
                .collect();
            return Materialized {
                points,
                mode: MaterializeMode::RangeUniformSplit,
                date_or_range,
            };
        }

        return Materialized {
            points: span.map(|day| PointRow::new(category, day, per_day)).collect(),
            mode: MaterializeMode::RangeUniform,
            date_or_range,
        };
    }

    let ends: Vec<NaiveDate> = if dates.len() >= 2 {
        vec![first, last]
    } else {
        vec![first]
    };
    let date_or_range = ends
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",");

    if ends.len() == 2 && splits(category, options.split_endpoints) {
        return Materialized {
            points: vec![
                PointRow::new(with_direction(category, Direction::Ship), first, value),
                PointRow::new(with_direction(category, Direction::Arr), last, value),
            ],
            mode: MaterializeMode::EndpointsSplit,
            date_or_range,
        };
    }

    let mode = if ends.len() == 2 {
        MaterializeMode::Endpoints
    } else {
        MaterializeMode::Single
    };
    Materialized {
        points: ends.iter().map(|&d| PointRow::new(category, d, value)).collect(),
        mode,
        date_or_range,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
