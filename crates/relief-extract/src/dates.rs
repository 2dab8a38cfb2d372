//! Calendar-date extraction from Chinese historical evidence text.
//!
//! Handles Republican-era years (`民国二十年` = 1931), Chinese numerals
//! (`初十`, `廿五`), ten-day decade markers (`上旬`/`中旬`/`下旬`), paired
//! months (`七、八月`) and month-day ranges (`7月25日至8月5日`).

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use regex::{Captures, Regex};
use relief_core::settings::RangeMode;
use relief_core::text::{cn_month_to_int, cn_to_int, normalize_separators, to_halfwidth};

/// Offset from a Republican-era year to the Gregorian year.
pub const ERA_OFFSET: i32 = 1911;

/// Day used when a mention names a month but no day.
const MID_MONTH: u32 = 15;

/// Characters that start a unit or multiplier word; a digit pair followed by
/// one of these is a decimal quantity, not a month-day.
const QUANTITY_FOLLOWERS: &[char] = &[
    '万', '千', '百', '吨', '斤', '石', '担', '斗', '升', '袋', '车', '公', 'k', 't',
];

/// Representative day of a decade marker.
pub fn decade_day(marker: &str) -> Option<u32> {
    match marker {
        "上旬" => Some(5),
        "中旬" => Some(15),
        "下旬" => Some(25),
        _ => None,
    }
}

/// Build a date with the day clamped into `[1, 28]`; invalid months yield `None`.
pub fn safe_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, 28))
}

/// First four-digit `19xx年`/`20xx年` year in `text`.
pub fn infer_year(text: &str) -> Option<i32> {
    let re = Regex::new(r"(19\d{2}|20\d{2})年").expect("regex is valid");
    re.captures(&to_halfwidth(text))
        .and_then(|c| c[1].parse().ok())
}

// ── DateParser ────────────────────────────────────────────────────────────────

/// Resolves one evidence text into a sorted, de-duplicated set of dates.
pub struct DateParser {
    range_mode: RangeMode,
    era_year: Regex,
    plain_year: Regex,
    iso_date: Regex,
    range: Regex,
    month_day_digit: Regex,
    month_day_cn: Regex,
    year_month: Regex,
    era_year_month: Regex,
    month_decade: Regex,
    paired_months: Regex,
}

impl DateParser {
    pub fn new(range_mode: RangeMode) -> Self {
        const NUM: &str = "一二三四五六七八九十廿卅";
        let day_tok = format!("上旬|中旬|下旬|[{NUM}初\\d]{{1,3}}");
        Self {
            range_mode,
            era_year: Regex::new(r"民国([〇零一二两三四五六七八九十廿卅]+|\d{1,3})年")
                .expect("regex is valid"),
            plain_year: Regex::new(r"(19\d{2}|20\d{2})年").expect("regex is valid"),
            iso_date: Regex::new(r"(19\d{2}|20\d{2})-(\d{1,2})-(\d{1,2})").expect("regex is valid"),
            range: Regex::new(&format!(
                r"(?P<m1>[{NUM}\d]{{1,3}})月(?P<d1>{day_tok})?日?\s*(?:-|到)\s*(?P<m2>[{NUM}\d]{{1,3}})月(?P<d2>{day_tok})?日?"
            ))
            .expect("regex is valid"),
            month_day_digit: Regex::new(r"(\d{1,2})[-.月](\d{1,2})日?").expect("regex is valid"),
            month_day_cn: Regex::new(&format!(r"([{NUM}]{{1,3}})月([{NUM}初]{{1,3}})日?"))
                .expect("regex is valid"),
            year_month: Regex::new(&format!(
                r"(?P<y>19\d{{2}}|20\d{{2}})年(?P<m>\d{{1,2}})月(?:(?P<dec>上旬|中旬|下旬)|(?P<day>[\d{NUM}初]))?"
            ))
            .expect("regex is valid"),
            era_year_month: Regex::new(&format!(
                r"民国(?P<y>[〇零一二两三四五六七八九十廿卅]+|\d{{1,3}})年(?P<m>[{NUM}\d]{{1,3}})月(?:(?P<dec>上旬|中旬|下旬)|(?P<day>[\d{NUM}初]))?"
            ))
            .expect("regex is valid"),
            month_decade: Regex::new(&format!(r"([{NUM}\d]{{1,3}})月(上旬|中旬|下旬)"))
                .expect("regex is valid"),
            paired_months: Regex::new(&format!(r"([{NUM}\d]{{1,2}})、([{NUM}\d]{{1,2}})月"))
                .expect("regex is valid"),
        }
    }

    pub fn range_mode(&self) -> RangeMode {
        self.range_mode
    }

    /// Resolve the year a text refers to: era year, then an explicit
    /// four-digit year, then `default_year`.
    pub fn resolve_year(&self, normalized: &str, default_year: Option<i32>) -> Option<i32> {
        self.era_year
            .captures(normalized)
            .and_then(|c| cn_to_int(&c[1]))
            .map(|y| y as i32 + ERA_OFFSET)
            .or_else(|| {
                self.plain_year
                    .captures(normalized)
                    .and_then(|c| c[1].parse().ok())
            })
            .or(default_year)
    }

    /// Parse every date mention in `text`.
    ///
    /// Returns an empty vector when no year can be resolved or nothing
    /// matches. Ranges expand according to the parser's [`RangeMode`].
    pub fn parse(&self, text: &str, default_year: Option<i32>) -> Vec<NaiveDate> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let normalized = normalize_separators(text);
        let mut out: BTreeSet<NaiveDate> = BTreeSet::new();

        // Full ISO dates carry their own year; mask them so the month-day
        // scan does not misread their digits.
        for c in self.iso_date.captures_iter(&normalized) {
            let (Ok(y), Ok(m), Ok(d)) = (c[1].parse(), c[2].parse(), c[3].parse()) else {
                continue;
            };
            out.extend(safe_date(y, m, d));
        }
        let s = self.iso_date.replace_all(&normalized, " ").into_owned();

        let year = self.resolve_year(&s, default_year);

        // Explicit year-month mentions (no trailing day).
        for c in self.year_month.captures_iter(&s) {
            if c.name("day").is_some() {
                continue;
            }
            let (Ok(y), Ok(m)) = (c["y"].parse::<i32>(), c["m"].parse::<u32>()) else {
                continue;
            };
            if (1..=12).contains(&m) {
                out.extend(safe_date(y, m, decade_or_mid(&c)));
            }
        }
        for c in self.era_year_month.captures_iter(&s) {
            if c.name("day").is_some() {
                continue;
            }
            let Some(era) = cn_to_int(&c["y"]) else {
                continue;
            };
            if let Some(m) = cn_month_to_int(&c["m"]) {
                out.extend(safe_date(era as i32 + ERA_OFFSET, m, decade_or_mid(&c)));
            }
        }

        let Some(year) = year else {
            return out.into_iter().collect();
        };

        for c in self.range.captures_iter(&s) {
            let start = range_endpoint(year, &c["m1"], c.name("d1").map(|m| m.as_str()));
            let end = range_endpoint(year, &c["m2"], c.name("d2").map(|m| m.as_str()));
            let (Some(a), Some(b)) = (start, end) else {
                continue;
            };
            let (a, b) = if a <= b { (a, b) } else { (b, a) };
            match self.range_mode {
                RangeMode::Uniform => {
                    let mut cur = a;
                    while cur <= b {
                        out.insert(cur);
                        cur += Duration::days(1);
                    }
                }
                RangeMode::Endpoints => {
                    out.insert(a);
                    out.insert(b);
                }
            }
        }

        for c in self.month_day_digit.captures_iter(&s) {
            let whole = c.get(0).map(|m| m.end()).unwrap_or(0);
            if s[whole..].trim_start().starts_with(QUANTITY_FOLLOWERS) {
                continue;
            }
            let (Ok(m), Ok(d)) = (c[1].parse::<u32>(), c[2].parse::<u32>()) else {
                continue;
            };
            if (1..=12).contains(&m) && (1..=31).contains(&d) {
                out.extend(safe_date(year, m, d));
            }
        }

        for c in self.month_day_cn.captures_iter(&s) {
            let (Some(m), Some(d)) = (cn_month_to_int(&c[1]), cn_to_int(&c[2])) else {
                continue;
            };
            if (1..=31).contains(&d) {
                out.extend(safe_date(year, m, d));
            }
        }

        for c in self.month_decade.captures_iter(&s) {
            if let (Some(m), Some(day)) = (cn_month_to_int(&c[1]), decade_day(&c[2])) {
                out.extend(safe_date(year, m, day));
            }
        }

        for c in self.paired_months.captures_iter(&s) {
            for tok in [&c[1], &c[2]] {
                if let Some(m) = cn_month_to_int(tok) {
                    out.extend(safe_date(year, m, MID_MONTH));
                }
            }
        }

        out.into_iter().collect()
    }
}

fn decade_or_mid(c: &Captures<'_>) -> u32 {
    c.name("dec")
        .and_then(|m| decade_day(m.as_str()))
        .unwrap_or(MID_MONTH)
}

fn range_endpoint(year: i32, month_tok: &str, day_tok: Option<&str>) -> Option<NaiveDate> {
    let month = cn_month_to_int(month_tok)?;
    let day = match day_tok {
        Some(tok) => decade_day(tok).or_else(|| cn_to_int(tok)).unwrap_or(MID_MONTH),
        None => MID_MONTH,
    };
    safe_date(year, month, day)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
