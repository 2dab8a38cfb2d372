//! Evidence ingestion and series extraction.
//!
//! Reads the evidence and geo-rule tables, parses dates and quantities out
//! of free text, classifies each row through an ordered rule cascade,
//! resolves ambiguous transport legs with a seeded fallback, and
//! materializes, pairs and aggregates the result into per-category series.

pub mod aggregator;
pub mod classifier;
pub mod dates;
pub mod fallback;
pub mod geo_rules;
pub mod materializer;
pub mod pairing;
pub mod pipeline;
pub mod quantity;
pub mod reader;

pub use relief_core as core;

pub use aggregator::{calendar_index, SeriesTable};
pub use geo_rules::GeoRuleSet;
pub use pipeline::{build_series_from_evidence, EvidencePipeline, ExtractionResult};
pub use reader::load_evidence_csv;
