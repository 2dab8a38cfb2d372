//! CSV output tables.
//!
//! Every writer takes any [`Write`] sink so the tables can be rendered to
//! memory in tests; [`write_all`] places the full set in a directory.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use relief_core::models::{CalibrationEstimate, ExtractionLogEntry, PointRow};
use relief_core::Result;
use relief_extract::SeriesTable;
use serde::Serialize;
use tracing::info;

use crate::hazard::HazardFit;
use crate::run::CalibrationRun;

pub const CALIB_RESULTS_FILE: &str = "CALIB_RESULTS.csv";
pub const SERIES_FILE: &str = "SERIES_EXTRACTED.csv";
pub const SPLIT_FILE: &str = "SERIES_EXTRACTED_SPLIT.csv";
pub const LOG_FILE: &str = "EXTRACTION_LOG.csv";
pub const HAZARD_FILE: &str = "HAZARD_SERIES.csv";

const ESTIMATE_HEADERS: &[&str] = &["param_id", "estimate", "note"];
const SERIES_HEADERS: &[&str] = &["ts_id", "date", "value"];
const LOG_HEADERS: &[&str] = &[
    "evidence_row",
    "ts_id",
    "mode",
    "date_or_range",
    "parsed",
    "note_head",
    "ctx_head",
];
const HAZARD_HEADERS: &[&str] = &[
    "date",
    "hazard_rate_est",
    "alpha_breach",
    "alpha_media",
    "objective",
    "success",
];

// ── Row shapes ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SeriesRecord {
    ts_id: String,
    date: NaiveDate,
    value: f64,
}

impl From<&PointRow> for SeriesRecord {
    fn from(p: &PointRow) -> Self {
        Self {
            ts_id: p.category.ts_id(),
            date: p.date,
            value: p.value,
        }
    }
}

#[derive(Debug, Serialize)]
struct HazardRecord {
    date: NaiveDate,
    hazard_rate_est: f64,
    alpha_breach: f64,
    alpha_media: f64,
    objective: f64,
    success: bool,
}

// ── Writers ───────────────────────────────────────────────────────────────────

/// Header row first, even when `rows` is empty.
fn write_rows<W, T, I>(sink: W, headers: &[&str], rows: I) -> Result<()>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(sink);
    wtr.write_record(headers)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_estimates<'a, W: Write>(
    sink: W,
    estimates: impl IntoIterator<Item = &'a CalibrationEstimate>,
) -> Result<()> {
    write_rows(sink, ESTIMATE_HEADERS, estimates)
}

/// One row per aggregated point, categories in table order.
pub fn write_series<W: Write>(sink: W, table: &SeriesTable) -> Result<()> {
    let rows = table.iter().flat_map(|(category, series)| {
        series.points().iter().map(move |&(date, value)| SeriesRecord {
            ts_id: category.ts_id(),
            date,
            value,
        })
    });
    write_rows(sink, SERIES_HEADERS, rows)
}

pub fn write_split_detail<W: Write>(sink: W, points: &[PointRow]) -> Result<()> {
    write_rows(sink, SERIES_HEADERS, points.iter().map(SeriesRecord::from))
}

pub fn write_log<W: Write>(sink: W, log: &[ExtractionLogEntry]) -> Result<()> {
    write_rows(sink, LOG_HEADERS, log)
}

pub fn write_hazard<W: Write>(sink: W, fit: &HazardFit) -> Result<()> {
    let rows = fit.dates.iter().zip(&fit.hazard).map(|(&date, &h)| HazardRecord {
        date,
        hazard_rate_est: h,
        alpha_breach: fit.alpha_breach,
        alpha_media: fit.alpha_media,
        objective: fit.objective,
        success: fit.success,
    });
    write_rows(sink, HAZARD_HEADERS, rows)
}

/// Write every output table of `run` into `dir`, creating it if needed.
///
/// The hazard table is only written when a hazard fit exists. Returns the
/// paths written.
pub fn write_all(dir: &Path, run: &CalibrationRun) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    let mut create = |name: &str| -> Result<File> {
        let path = dir.join(name);
        let file = File::create(&path)?;
        written.push(path);
        Ok(file)
    };

    write_estimates(create(CALIB_RESULTS_FILE)?, run.estimates.values())?;
    write_series(create(SERIES_FILE)?, &run.extraction.series)?;
    write_split_detail(create(SPLIT_FILE)?, &run.extraction.split_detail)?;
    write_log(create(LOG_FILE)?, &run.extraction.log)?;
    if let Some(fit) = &run.hazard {
        write_hazard(create(HAZARD_FILE)?, fit)?;
    }

    info!("Wrote {} output tables to {}", written.len(), dir.display());
    Ok(written)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
