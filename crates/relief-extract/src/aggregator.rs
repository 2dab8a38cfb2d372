//! Point-row aggregation onto a regular daily or weekly calendar.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use relief_core::models::{Category, PointRow, Series};
use relief_core::settings::Frequency;

/// One aggregated series per observed category, ordered by category.
pub type SeriesTable = BTreeMap<Category, Series>;

// ── Grouping ──────────────────────────────────────────────────────────────────

/// Sum values per `(category, date)`, sorted by category then date.
///
/// This is the split-detail table: finer than the resampled series but
/// with duplicate points merged.
pub fn group_sum(points: &[PointRow]) -> Vec<PointRow> {
    let mut sums: BTreeMap<(Category, NaiveDate), f64> = BTreeMap::new();
    for p in points {
        *sums.entry((p.category, p.date)).or_insert(0.0) += p.value;
    }
    sums.into_iter()
        .map(|((category, date), value)| PointRow::new(category, date, value))
        .collect()
}

// ── Resampling ────────────────────────────────────────────────────────────────

/// Calendar slot a date falls into.
///
/// Weekly slots are labelled by the first anchor weekday on or after the date.
pub fn period_label(date: NaiveDate, frequency: Frequency) -> NaiveDate {
    match frequency {
        Frequency::Daily => date,
        Frequency::Weekly { anchor } => {
            let target = anchor.num_days_from_monday() as i64;
            let current = date.weekday().num_days_from_monday() as i64;
            date + Duration::days((target - current).rem_euclid(7))
        }
    }
}

fn step(frequency: Frequency) -> Duration {
    match frequency {
        Frequency::Daily => Duration::days(1),
        Frequency::Weekly { .. } => Duration::days(7),
    }
}

/// Sum `(date, value)` pairs into calendar slots and zero-fill every slot
/// between the first and last observed one.
pub fn resample(points: &[(NaiveDate, f64)], frequency: Frequency) -> Series {
    let mut slots: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for &(date, value) in points {
        *slots.entry(period_label(date, frequency)).or_insert(0.0) += value;
    }

    let (Some(&start), Some(&end)) = (slots.keys().next(), slots.keys().next_back()) else {
        return Series::default();
    };

    let out = slots_between(start, end, frequency)
        .into_iter()
        .map(|slot| (slot, slots.get(&slot).copied().unwrap_or(0.0)))
        .collect();
    Series::new(out)
}

fn slots_between(start: NaiveDate, end: NaiveDate, frequency: Frequency) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut cur = period_label(start, frequency);
    while cur <= end {
        out.push(cur);
        cur += step(frequency);
    }
    out
}

/// Every calendar slot from the earliest to the latest date of `series`.
///
/// Estimators align series on this index so that one position is one
/// calendar step even where neither series has a slot.
pub fn calendar_index<'a>(
    series: impl IntoIterator<Item = &'a Series>,
    frequency: Frequency,
) -> Vec<NaiveDate> {
    let observed = Series::union_index(series);
    match (observed.first(), observed.last()) {
        (Some(&start), Some(&end)) => slots_between(start, end, frequency),
        _ => Vec::new(),
    }
}

/// Group, sum and resample point rows into one series per category.
pub fn aggregate(points: &[PointRow], frequency: Frequency) -> SeriesTable {
    let mut by_category: BTreeMap<Category, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for p in group_sum(points) {
        by_category
            .entry(p.category)
            .or_default()
            .push((p.date, p.value));
    }
    by_category
        .into_iter()
        .map(|(category, pts)| (category, resample(&pts, frequency)))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
