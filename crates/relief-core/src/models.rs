use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ── Evidence ──────────────────────────────────────────────────────────────────

/// One historical citation from the evidence table.
///
/// Every text field may be empty; the reader defaults absent columns to `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRow {
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default, alias = "sheet_or_page")]
    pub page_or_sheet: String,
    #[serde(default)]
    pub snippet_or_key: String,
    /// Identifier of the series the citation was mapped to, e.g. `LINK_PC`.
    #[serde(default)]
    pub mapped_ts_id: String,
    /// Parameter code, e.g. `P010` (dispatch) or `P020` (arrival).
    #[serde(default)]
    pub mapped_param_id: String,
    #[serde(default)]
    pub quote_excerpt: String,
    #[serde(default)]
    pub notes: String,
}

// ── Link tiers and directions ─────────────────────────────────────────────────

/// A transport leg between two adjacent administrative levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Province to prefecture.
    #[serde(rename = "ZP")]
    Zp,
    /// Prefecture to county.
    #[serde(rename = "PC")]
    Pc,
    /// County to village.
    #[serde(rename = "CV")]
    Cv,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Zp, Tier::Pc, Tier::Cv];

    /// Two-letter link code (`"ZP"`, `"PC"`, `"CV"`).
    pub fn code(self) -> &'static str {
        match self {
            Tier::Zp => "ZP",
            Tier::Pc => "PC",
            Tier::Cv => "CV",
        }
    }

    /// Single-letter name of the upstream level, used in threshold ids.
    pub fn level(self) -> &'static str {
        match self {
            Tier::Zp => "Z",
            Tier::Pc => "P",
            Tier::Cv => "C",
        }
    }

    /// Parse a link code, ignoring case and surrounding whitespace.
    pub fn from_code(code: &str) -> Option<Tier> {
        match code.trim().to_uppercase().as_str() {
            "ZP" => Some(Tier::Zp),
            "PC" => Some(Tier::Pc),
            "CV" => Some(Tier::Cv),
            _ => None,
        }
    }
}

/// Which side of a transport leg an observation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "SHIP")]
    Ship,
    #[serde(rename = "ARR")]
    Arr,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Ship, Direction::Arr];

    pub fn code(self) -> &'static str {
        match self {
            Direction::Ship => "SHIP",
            Direction::Arr => "ARR",
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Ship => Direction::Arr,
            Direction::Arr => Direction::Ship,
        }
    }
}

/// A transport leg whose tier and/or direction may still be unresolved.
///
/// `None` renders as `UNK`. Unresolved legs only exist between
/// classification and the terminal fallback sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkLeg {
    pub tier: Option<Tier>,
    pub direction: Option<Direction>,
}

impl LinkLeg {
    pub fn new(tier: Option<Tier>, direction: Option<Direction>) -> Self {
        Self { tier, direction }
    }

    pub fn resolved(tier: Tier, direction: Direction) -> Self {
        Self::new(Some(tier), Some(direction))
    }

    pub fn is_resolved(&self) -> bool {
        self.tier.is_some() && self.direction.is_some()
    }

    /// The same tier with the direction replaced.
    pub fn with_direction(self, direction: Direction) -> Self {
        Self::new(self.tier, Some(direction))
    }
}

// ── Category ──────────────────────────────────────────────────────────────────

/// Flow category assigned to an evidence row and carried by its point rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Link(LinkLeg),
    MediaReq,
    Stocks,
    Breach,
    Alloc,
    VDist,
    Misc,
}

impl Category {
    pub fn link(tier: Tier, direction: Direction) -> Self {
        Category::Link(LinkLeg::resolved(tier, direction))
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Category::Link(_))
    }

    pub fn as_link(&self) -> Option<LinkLeg> {
        match self {
            Category::Link(leg) => Some(*leg),
            _ => None,
        }
    }

    /// Series identifier, e.g. `LINK_PC_ARR`, `LINK_UNK_SHIP`, `MEDIA_REQ`.
    pub fn ts_id(&self) -> String {
        match self {
            Category::Link(leg) => format!(
                "LINK_{}_{}",
                leg.tier.map(Tier::code).unwrap_or("UNK"),
                leg.direction.map(Direction::code).unwrap_or("UNK"),
            ),
            Category::MediaReq => "MEDIA_REQ".to_string(),
            Category::Stocks => "STOCKS".to_string(),
            Category::Breach => "BREACH".to_string(),
            Category::Alloc => "ALLOC".to_string(),
            Category::VDist => "V_DIST".to_string(),
            Category::Misc => "MISC".to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ts_id())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MEDIA_REQ" => return Ok(Category::MediaReq),
            "STOCKS" => return Ok(Category::Stocks),
            "BREACH" => return Ok(Category::Breach),
            "ALLOC" => return Ok(Category::Alloc),
            "V_DIST" => return Ok(Category::VDist),
            "MISC" => return Ok(Category::Misc),
            _ => {}
        }
        let mut parts = s.split('_');
        if parts.next() != Some("LINK") {
            return Err(format!("unknown series id: {s}"));
        }
        let tier = match parts.next() {
            Some("UNK") => None,
            Some(code) => Some(Tier::from_code(code).ok_or_else(|| format!("bad tier in {s}"))?),
            None => return Err(format!("bad link id: {s}")),
        };
        let direction = match parts.next() {
            Some("SHIP") => Some(Direction::Ship),
            Some("ARR") => Some(Direction::Arr),
            Some("UNK") => None,
            _ => return Err(format!("bad direction in {s}")),
        };
        Ok(Category::Link(LinkLeg::new(tier, direction)))
    }
}

// ── Point rows ────────────────────────────────────────────────────────────────

/// The atomic dated observation produced by materialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRow {
    pub category: Category,
    pub date: NaiveDate,
    pub value: f64,
}

impl PointRow {
    pub fn new(category: Category, date: NaiveDate, value: f64) -> Self {
        Self {
            category,
            date,
            value,
        }
    }
}

// ── Series ────────────────────────────────────────────────────────────────────

/// A date-ordered sequence of `(date, value)` pairs, one per calendar slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<(NaiveDate, f64)>,
}

impl Series {
    /// Build a series, sorting by date.
    pub fn new(mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.sort_by_key(|(d, _)| *d);
        Self { points }
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|(d, _)| *d).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    /// Value at `date`, or `None` when the series has no slot there.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |(d, _)| *d)
            .ok()
            .map(|i| self.points[i].1)
    }

    /// Values aligned to `index`, zero where this series has no slot.
    pub fn reindex(&self, index: &[NaiveDate]) -> Vec<f64> {
        index.iter().map(|d| self.get(*d).unwrap_or(0.0)).collect()
    }

    /// Sorted union of the dates of every series in `series`.
    pub fn union_index<'a>(series: impl IntoIterator<Item = &'a Series>) -> Vec<NaiveDate> {
        let set: BTreeSet<NaiveDate> = series
            .into_iter()
            .flat_map(|s| s.points.iter().map(|(d, _)| *d))
            .collect();
        set.into_iter().collect()
    }

    /// Pointwise sum over the union of both indices; missing slots count as zero.
    pub fn add(&self, other: &Series) -> Series {
        let index = Series::union_index([self, other]);
        let lhs = self.reindex(&index);
        let rhs = other.reindex(&index);
        Series::new(
            index
                .into_iter()
                .zip(lhs.into_iter().zip(rhs))
                .map(|(d, (a, b))| (d, a + b))
                .collect(),
        )
    }

    /// Sum a collection of series, or `None` when it is empty.
    pub fn sum_all<'a>(series: impl IntoIterator<Item = &'a Series>) -> Option<Series> {
        series.into_iter().fold(None, |acc, s| match acc {
            None => Some(s.clone()),
            Some(total) => Some(total.add(s)),
        })
    }
}

// ── Outputs ───────────────────────────────────────────────────────────────────

/// One calibrated parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEstimate {
    pub param_id: String,
    #[serde(rename = "estimate")]
    pub value: f64,
    pub note: String,
}

impl CalibrationEstimate {
    pub fn new(param_id: impl Into<String>, value: f64, note: impl Into<String>) -> Self {
        Self {
            param_id: param_id.into(),
            value,
            note: note.into(),
        }
    }
}

/// Which materialization branch handled an evidence row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterializeMode {
    NoDate,
    RangeUniform,
    RangeUniformSplit,
    Endpoints,
    EndpointsSplit,
    Single,
}

impl fmt::Display for MaterializeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MaterializeMode::NoDate => "NO_DATE",
            MaterializeMode::RangeUniform => "RANGE_UNIFORM",
            MaterializeMode::RangeUniformSplit => "RANGE_UNIFORM_SPLIT",
            MaterializeMode::Endpoints => "ENDPOINTS",
            MaterializeMode::EndpointsSplit => "ENDPOINTS_SPLIT",
            MaterializeMode::Single => "SINGLE",
        };
        f.write_str(s)
    }
}

/// Whether a row's value came from a parsed quantity or the default event value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSource {
    #[serde(rename = "QTY")]
    Quantity,
    #[serde(rename = "EVENT+1")]
    DefaultEvent,
}

/// Audit record for one evidence row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionLogEntry {
    pub evidence_row: usize,
    pub ts_id: String,
    pub mode: MaterializeMode,
    pub date_or_range: String,
    pub parsed: Option<ValueSource>,
    pub note_head: String,
    pub ctx_head: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
