//! Evidence-table loading.
//!
//! Reads the citation table into [`EvidenceRow`]s. Absent columns default
//! to empty strings and extra columns are ignored; rows that cannot be
//! decoded are skipped with a warning.

use std::io::Read;
use std::path::Path;

use relief_core::models::EvidenceRow;
use relief_core::{CalibError, Result};
use tracing::{debug, info, warn};

// ── Public API ────────────────────────────────────────────────────────────────

/// Load the evidence table from a CSV file.
///
/// A missing file is [`CalibError::MissingInput`]; this is the one input a
/// run cannot proceed without.
pub fn load_evidence_csv(path: &Path) -> Result<Vec<EvidenceRow>> {
    if !path.exists() {
        return Err(CalibError::MissingInput(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|source| CalibError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = read_evidence(file)?;
    info!("Loaded {} evidence rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read evidence rows from any CSV source with a header row.
pub fn read_evidence<R: Read>(source: R) -> Result<Vec<EvidenceRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(source);

    // Fails early on an unreadable header line.
    reader.headers()?;

    let mut rows = Vec::new();
    let mut rows_read = 0u64;
    let mut rows_dropped = 0u64;
    for (line, record) in reader.deserialize::<EvidenceRow>().enumerate() {
        rows_read += 1;
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                rows_dropped += 1;
                warn!("Skipping malformed evidence row {}: {}", line + 1, e);
            }
        }
    }

    debug!("Evidence table: {} read, {} dropped", rows_read, rows_dropped);
    Ok(rows)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
