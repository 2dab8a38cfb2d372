//! Place-name → link-tier rules loaded from an optional CSV table.
//!
//! The table needs `pattern` and `link` columns; anything else is ignored.
//! Order matters: the first matching rule decides the tier.

use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use regex::{Regex, RegexBuilder};
use relief_core::models::Tier;
use relief_core::{CalibError, Result};
use serde::Deserialize;
use tracing::{info, warn};

/// One compiled place-name rule.
#[derive(Debug, Clone)]
pub struct GeoRule {
    pub pattern: Regex,
    pub tier: Tier,
}

const REQUIRED_COLUMNS: [&str; 2] = ["pattern", "link"];

fn require_columns(headers: &StringRecord, required: &[&str]) -> Result<()> {
    match required.iter().find(|c| !headers.iter().any(|h| h == **c)) {
        Some(missing) => Err(CalibError::MissingColumn(missing.to_string())),
        None => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
struct RuleRecord {
    #[serde(default)]
    pattern: String,
    #[serde(default)]
    link: String,
}

/// Ordered list of place-name rules; first match wins.
#[derive(Debug, Clone, Default)]
pub struct GeoRuleSet {
    rules: Vec<GeoRule>,
}

impl GeoRuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile `(pattern, link)` pairs, dropping unknown links silently and
    /// invalid patterns with a warning.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut rules = Vec::new();
        for (raw_pattern, raw_link) in pairs {
            let Some(tier) = Tier::from_code(raw_link) else {
                continue;
            };
            let pattern = raw_pattern.trim().trim_matches(|c| c == '"' || c == '\'');
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => rules.push(GeoRule { pattern: re, tier }),
                Err(e) => warn!("Cannot compile geo rule pattern {:?}: {}", pattern, e),
            }
        }
        Self { rules }
    }

    /// Load rules from a CSV file.
    ///
    /// Never fails: a missing or unreadable file, or one without the
    /// required columns, yields an empty set.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::empty();
        }
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to read geo rules {}: {}", path.display(), e);
                return Self::empty();
            }
        };
        let set = Self::from_reader(file, &path.display().to_string());
        info!("Loaded {} geo-link rules from {}", set.len(), path.display());
        set
    }

    /// Read rules from any CSV source; `origin` names it in log messages.
    pub fn from_reader<R: Read>(source: R, origin: &str) -> Self {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(source);

        let headers = match reader.headers() {
            Ok(h) => h.clone(),
            Err(e) => {
                warn!("Failed to read geo rules {}: {}", origin, e);
                return Self::empty();
            }
        };
        if let Err(e) = require_columns(&headers, &REQUIRED_COLUMNS) {
            warn!("Ignoring geo rules {}: {}", origin, e);
            return Self::empty();
        }

        let mut records = Vec::new();
        for record in reader.deserialize::<RuleRecord>() {
            match record {
                Ok(r) => records.push(r),
                Err(e) => warn!("Skipping malformed geo rule row in {}: {}", origin, e),
            }
        }
        Self::from_pairs(records.iter().map(|r| (r.pattern.as_str(), r.link.as_str())))
    }

    /// Tier of the first rule whose pattern occurs in `text`.
    pub fn first_match(&self, text: &str) -> Option<Tier> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.tier)
    }

    pub fn rules(&self) -> &[GeoRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_pairs_skips_unknown_links_and_bad_patterns() {
        let set = GeoRuleSet::from_pairs([
            ("汉口", "pc"),
            ("武昌", "XX"),
            ("(unclosed", "ZP"),
            ("\"沙市\"", " cv "),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.first_match("运抵沙市"), Some(Tier::Cv));
        assert_eq!(set.first_match("武昌"), None);
    }

    #[test]
    fn test_first_match_respects_order() {
        let set = GeoRuleSet::from_pairs([("汉", "ZP"), ("汉口", "PC")]);
        assert_eq!(set.first_match("汉口码头"), Some(Tier::Zp));
    }

    #[test]
    fn test_case_insensitive_patterns() {
        let set = GeoRuleSet::from_pairs([("hankow", "PC")]);
        assert_eq!(set.first_match("arrived HANKOW"), Some(Tier::Pc));
    }

    #[test]
    fn test_from_reader_ignores_extra_columns() {
        let csv = "pattern,link,comment\n汉口,PC,river port\n岳阳,ZP,\n";
        let set = GeoRuleSet::from_reader(csv.as_bytes(), "inline");
        assert_eq!(set.len(), 2);
        assert_eq!(set.first_match("岳阳"), Some(Tier::Zp));
    }

    #[test]
    fn test_from_reader_missing_columns_is_empty() {
        let csv = "place,tier\n汉口,PC\n";
        assert!(GeoRuleSet::from_reader(csv.as_bytes(), "inline").is_empty());
    }

    #[test]
    fn test_require_columns_names_the_missing_one() {
        let headers = StringRecord::from(vec!["pattern", "comment"]);
        let err = require_columns(&headers, &REQUIRED_COLUMNS).unwrap_err();
        assert!(matches!(err, CalibError::MissingColumn(ref c) if c == "link"));
        let headers = StringRecord::from(vec!["link", "pattern"]);
        assert!(require_columns(&headers, &REQUIRED_COLUMNS).is_ok());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = TempDir::new().expect("tempdir");
        assert!(GeoRuleSet::load(&tmp.path().join("geo_link_map.csv")).is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("geo_link_map.csv");
        std::fs::write(&path, "pattern,link\n县.*乡,CV\n").unwrap();
        let set = GeoRuleSet::load(&path);
        assert_eq!(set.len(), 1);
        assert_eq!(set.first_match("某县某乡"), Some(Tier::Cv));
    }
}
