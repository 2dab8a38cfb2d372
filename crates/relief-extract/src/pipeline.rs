//! Evidence rows → classified, materialized, paired and aggregated series.

use relief_core::models::{EvidenceRow, ExtractionLogEntry, MaterializeMode, PointRow, ValueSource};
use relief_core::settings::CalibConfig;
use relief_core::text::head;
use tracing::{debug, info};

use crate::aggregator::{aggregate, group_sum, SeriesTable};
use crate::classifier::EvidenceClassifier;
use crate::dates::{infer_year, DateParser};
use crate::fallback::FallbackAssigner;
use crate::geo_rules::GeoRuleSet;
use crate::materializer::{materialize, MaterializeOptions};
use crate::pairing::synthesize_pairs;
use crate::quantity::QuantityParser;

const NOTE_HEAD_CHARS: usize = 60;
const CTX_HEAD_CHARS: usize = 120;

// ── Results ───────────────────────────────────────────────────────────────────

/// Counters describing one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionMetadata {
    pub rows_read: usize,
    /// Rows with a blank `mapped_ts_id`; they leave no log entry.
    pub rows_skipped: usize,
    pub rows_without_date: usize,
    /// Point rows produced by materialization, before pairing.
    pub point_rows: usize,
    pub synthesized_rows: usize,
    pub series_count: usize,
}

#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub series: SeriesTable,
    /// Points summed per `(category, date)` before resampling.
    pub split_detail: Vec<PointRow>,
    pub log: Vec<ExtractionLogEntry>,
    pub metadata: ExtractionMetadata,
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Owns the parsers and the fallback generator for one run.
///
/// The generator is seeded in [`EvidencePipeline::new`]; calling
/// [`EvidencePipeline::build`] twice on one pipeline continues its stream.
pub struct EvidencePipeline {
    config: CalibConfig,
    geo_rules: GeoRuleSet,
    dates: DateParser,
    quantities: QuantityParser,
    fallback: FallbackAssigner,
}

impl EvidencePipeline {
    pub fn new(config: &CalibConfig, geo_rules: GeoRuleSet) -> Self {
        Self {
            dates: DateParser::new(config.range_mode),
            quantities: QuantityParser::from_config(config),
            fallback: FallbackAssigner::new(&config.fallback),
            config: config.clone(),
            geo_rules,
        }
    }

    /// Row default year: a `19xx年`/`20xx年` token in notes or excerpt, else a
    /// `period` that is itself a four-digit year.
    fn default_year(row: &EvidenceRow) -> Option<i32> {
        infer_year(&format!("{} {}", row.notes, row.quote_excerpt)).or_else(|| {
            let period = row.period.trim();
            let is_year = period.len() == 4
                && (period.starts_with("19") || period.starts_with("20"))
                && period.chars().all(|c| c.is_ascii_digit());
            if is_year {
                period.parse().ok()
            } else {
                None
            }
        })
    }

    pub fn build(&mut self, rows: &[EvidenceRow]) -> ExtractionResult {
        let classifier = EvidenceClassifier::new(&self.geo_rules);
        let options = MaterializeOptions {
            range_mode: self.config.range_mode,
            split_endpoints: self.config.fallback.split_endpoints,
        };

        let mut metadata = ExtractionMetadata {
            rows_read: rows.len(),
            ..ExtractionMetadata::default()
        };
        let mut points: Vec<PointRow> = Vec::new();
        let mut log: Vec<ExtractionLogEntry> = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let ts_id = row.mapped_ts_id.trim();
            if ts_id.is_empty() {
                metadata.rows_skipped += 1;
                continue;
            }
            let note_head = head(&row.notes, NOTE_HEAD_CHARS);
            let ctx_head = head(&row.quote_excerpt, CTX_HEAD_CHARS);

            let year = Self::default_year(row);
            let mut dates = self.dates.parse(&row.quote_excerpt, year);
            if dates.is_empty() {
                dates = self.dates.parse(&row.notes, year);
            }
            if dates.is_empty() {
                metadata.rows_without_date += 1;
                debug!("Evidence row {} ({}) has no resolvable date", index, ts_id);
                log.push(ExtractionLogEntry {
                    evidence_row: index,
                    ts_id: ts_id.to_string(),
                    mode: MaterializeMode::NoDate,
                    date_or_range: String::new(),
                    parsed: None,
                    note_head,
                    ctx_head,
                });
                continue;
            }

            let quantity = self.quantities.parse(&row.quote_excerpt);
            let (value, source) = match quantity {
                Some(q) => (q, ValueSource::Quantity),
                None => (self.config.default_event_value, ValueSource::DefaultEvent),
            };

            let mut category = classifier.classify(row).category;
            if self.config.fallback.enabled {
                category = self.fallback.resolve_category(category);
            }

            let materialized = materialize(category, &dates, value, options);
            points.extend(materialized.points);
            log.push(ExtractionLogEntry {
                evidence_row: index,
                ts_id: ts_id.to_string(),
                mode: materialized.mode,
                date_or_range: materialized.date_or_range,
                parsed: Some(source),
                note_head,
                ctx_head,
            });
        }
        metadata.point_rows = points.len();

        if self.config.fallback.enabled && self.config.fallback.reassign_unresolved {
            points = self.fallback.sweep(&points);
        }

        if self.config.pairing.enabled {
            let synthesized = synthesize_pairs(&points, &self.config.pairing);
            metadata.synthesized_rows = synthesized.len();
            points.extend(synthesized);
        }

        let split_detail = group_sum(&points);
        let series = aggregate(&points, self.config.frequency);
        metadata.series_count = series.len();

        info!(
            "Extracted {} series from {} evidence rows ({} without date, {} synthesized points)",
            metadata.series_count,
            metadata.rows_read,
            metadata.rows_without_date,
            metadata.synthesized_rows
        );

        ExtractionResult {
            series,
            split_detail,
            log,
            metadata,
        }
    }
}

/// One-shot extraction with a freshly seeded generator.
pub fn build_series_from_evidence(
    rows: &[EvidenceRow],
    geo_rules: &GeoRuleSet,
    config: &CalibConfig,
) -> ExtractionResult {
    EvidencePipeline::new(config, geo_rules.clone()).build(rows)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use relief_core::models::{Category, Direction, Tier};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(period: &str, ts: &str, param: &str, excerpt: &str, notes: &str) -> EvidenceRow {
        EvidenceRow {
            period: period.to_string(),
            mapped_ts_id: ts.to_string(),
            mapped_param_id: param.to_string(),
            quote_excerpt: excerpt.to_string(),
            notes: notes.to_string(),
            ..EvidenceRow::default()
        }
    }

    fn run(rows: &[EvidenceRow]) -> ExtractionResult {
        build_series_from_evidence(rows, &GeoRuleSet::empty(), &CalibConfig::default())
    }

    // ── Materialization through the pipeline ──────────────────────────────────

    #[test]
    fn test_uniform_range_split_into_ship_and_arr() {
        let rows = vec![row("", "LINK_PC", "P010", "1931年7月1日至7月3日发运3吨", "")];
        let out = run(&rows);
        let ship = Category::link(Tier::Pc, Direction::Ship);
        let arr = Category::link(Tier::Pc, Direction::Arr);
        assert_eq!(
            out.split_detail,
            vec![
                PointRow::new(ship, d(1931, 7, 1), 1000.0),
                PointRow::new(ship, d(1931, 7, 2), 1000.0),
                PointRow::new(arr, d(1931, 7, 3), 1000.0),
            ]
        );
        assert_eq!(out.log.len(), 1);
        assert_eq!(out.log[0].mode, MaterializeMode::RangeUniformSplit);
        assert_eq!(out.log[0].parsed, Some(ValueSource::Quantity));
        assert_eq!(out.metadata.synthesized_rows, 0);
    }

    #[test]
    fn test_arrival_only_tier_gets_synthesized_dispatch() {
        let rows = vec![row("", "LINK_CV", "P020", "1931年8月5日运到", "")];
        let out = run(&rows);
        let ship = Category::link(Tier::Cv, Direction::Ship);
        assert_eq!(out.series[&ship].points(), &[(d(1931, 8, 2), 1.0)]);
        assert_eq!(out.metadata.synthesized_rows, 1);
        assert_eq!(out.log[0].parsed, Some(ValueSource::DefaultEvent));
    }

    #[test]
    fn test_period_supplies_default_year_and_breach_is_single() {
        let rows = vec![row("1954", "BREACH", "", "八月下旬决口", "")];
        let out = run(&rows);
        assert_eq!(
            out.series[&Category::Breach].points(),
            &[(d(1954, 8, 25), 1.0)]
        );
        assert_eq!(out.log[0].mode, MaterializeMode::Single);
    }

    #[test]
    fn test_notes_used_when_excerpt_has_no_date() {
        let rows = vec![row("", "MEDIA_REQ", "", "呈文请赈", "1931年7月25日")];
        let out = run(&rows);
        assert_eq!(
            out.series[&Category::MediaReq].points(),
            &[(d(1931, 7, 25), 1.0)]
        );
    }

    // ── Skips and omissions ───────────────────────────────────────────────────

    #[test]
    fn test_no_date_row_is_logged_and_dropped() {
        let rows = vec![
            row("", "ALLOC", "", "拨款若干", "无日期"),
            row("", "  ", "", "1931年7月1日", ""),
        ];
        let out = run(&rows);
        assert!(out.series.is_empty());
        assert!(out.split_detail.is_empty());
        assert_eq!(out.log.len(), 1);
        assert_eq!(out.log[0].mode, MaterializeMode::NoDate);
        assert_eq!(out.log[0].parsed, None);
        assert_eq!(out.log[0].note_head, "无日期");
        assert_eq!(out.metadata.rows_without_date, 1);
        assert_eq!(out.metadata.rows_skipped, 1);
    }

    // ── Fallback ──────────────────────────────────────────────────────────────

    fn ambiguous_rows() -> Vec<EvidenceRow> {
        (1..=12)
            .map(|day| row("1931", "LINK", "", &format!("7月{day}日 运输"), ""))
            .collect()
    }

    #[test]
    fn test_fallback_is_reproducible() {
        let a = run(&ambiguous_rows());
        let b = run(&ambiguous_rows());
        assert_eq!(a.split_detail, b.split_detail);
        assert_eq!(a.log, b.log);
        assert_eq!(a.series, b.series);
    }

    #[test]
    fn test_fallback_resolves_every_link() {
        let out = run(&ambiguous_rows());
        assert!(!out.split_detail.is_empty());
        for p in &out.split_detail {
            let leg = p.category.as_link().expect("only link rows");
            assert!(leg.is_resolved(), "unresolved {}", p.category);
        }
    }

    #[test]
    fn test_fallback_disabled_keeps_unresolved() {
        let mut cfg = CalibConfig::default();
        cfg.fallback.enabled = false;
        cfg.pairing.enabled = false;
        let rows = vec![row("1931", "LINK", "", "7月9日 运输", "")];
        let out = build_series_from_evidence(&rows, &GeoRuleSet::empty(), &cfg);
        let ids: Vec<String> = out.series.keys().map(|c| c.ts_id()).collect();
        assert_eq!(ids, vec!["LINK_UNK_UNK"]);
    }
}
