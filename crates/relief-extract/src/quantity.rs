//! Mass-equivalent quantity extraction.
//!
//! Every `(number, [multiplier,] unit)` mention is converted to kilograms and
//! summed. The multiplier pass and the plain pass scan the same text
//! independently, so a span matched by both is counted twice.

use std::collections::BTreeMap;

use regex::Regex;
use relief_core::settings::CalibConfig;
use relief_core::text::to_halfwidth;
use tracing::debug;

pub struct QuantityParser {
    with_multiplier: Option<Regex>,
    plain: Option<Regex>,
    unit_factors: BTreeMap<String, f64>,
    multipliers: BTreeMap<String, f64>,
}

/// Regex alternation over `words`, longest first so `公斤` wins over `斤`.
fn alternation<'a>(words: impl Iterator<Item = &'a String>) -> Option<String> {
    let mut words: Vec<&String> = words.filter(|w| !w.is_empty()).collect();
    if words.is_empty() {
        return None;
    }
    words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    Some(
        words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|"),
    )
}

impl QuantityParser {
    pub fn new(unit_factors: BTreeMap<String, f64>, multipliers: BTreeMap<String, f64>) -> Self {
        let units = alternation(unit_factors.keys());
        let mults = alternation(multipliers.keys());

        let with_multiplier = match (&units, &mults) {
            (Some(u), Some(m)) => Some(
                Regex::new(&format!(
                    r"(?P<num>[\d,.]+)\s*(?P<mult>{m})\s*(?P<unit>{u})"
                ))
                .expect("regex is valid"),
            ),
            _ => None,
        };
        let plain = units.as_ref().map(|u| {
            Regex::new(&format!(r"(?P<num>[\d,.]+)\s*(?P<unit>{u})")).expect("regex is valid")
        });

        Self {
            with_multiplier,
            plain,
            unit_factors,
            multipliers,
        }
    }

    pub fn from_config(config: &CalibConfig) -> Self {
        Self::new(config.unit_factors.clone(), config.multipliers.clone())
    }

    /// Total kilograms cited in `text`, or `None` when nothing matched.
    pub fn parse(&self, text: &str) -> Option<f64> {
        if text.trim().is_empty() {
            return None;
        }
        let s = to_halfwidth(text);
        let mut total = 0.0;
        let mut found = false;

        if let Some(re) = &self.with_multiplier {
            for c in re.captures_iter(&s) {
                let Some(num) = parse_number(&c["num"]) else {
                    continue;
                };
                let mult = self.multipliers.get(&c["mult"]).copied().unwrap_or(1.0);
                if let Some(factor) = self.unit_factors.get(&c["unit"]) {
                    total += num * mult * factor;
                    found = true;
                }
            }
        }

        if let Some(re) = &self.plain {
            for c in re.captures_iter(&s) {
                let Some(num) = parse_number(&c["num"]) else {
                    continue;
                };
                if let Some(factor) = self.unit_factors.get(&c["unit"]) {
                    total += num * factor;
                    found = true;
                }
            }
        }

        found.then_some(total)
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            debug!("Skipping unparseable quantity token {:?}", raw);
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> QuantityParser {
        QuantityParser::from_config(&CalibConfig::default())
    }

    #[test]
    fn test_multiplier_and_unit() {
        let v = parser().parse("运去3万斤").unwrap();
        assert!((v - 15_000.0).abs() < 1e-9, "v = {v}");
    }

    #[test]
    fn test_no_quantity_is_none() {
        assert_eq!(parser().parse("七月初十到达县城"), None);
        assert_eq!(parser().parse(""), None);
    }

    #[test]
    fn test_multiple_mentions_are_summed() {
        let v = parser().parse("首批2吨，次批500公斤").unwrap();
        assert!((v - 2_500.0).abs() < 1e-9);
    }

    #[test]
    fn test_longest_unit_wins() {
        // 公斤 must not be read as 斤.
        let v = parser().parse("40公斤").unwrap();
        assert!((v - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_thousands_separator_and_decimal() {
        let v = parser().parse("1,200袋 及 3.5万石").unwrap();
        assert!((v - (1_200.0 * 50.0 + 3.5e4 * 120.0)).abs() < 1e-6);
    }

    #[test]
    fn test_full_width_digits() {
        let v = parser().parse("２吨").unwrap();
        assert!((v - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiplier_before_compound_unit() {
        // 千千克 reads as 千 × 千克.
        let v = parser().parse("5千千克").unwrap();
        assert!((v - 5_000.0).abs() < 1e-9);
        let v = parser().parse("5千克").unwrap();
        assert!((v - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_lone_separator_is_skipped() {
        assert_eq!(parser().parse("..吨"), None);
    }

    #[test]
    fn test_custom_tables() {
        let units = BTreeMap::from([("包".to_string(), 25.0)]);
        let p = QuantityParser::new(units, BTreeMap::new());
        assert_eq!(p.parse("4包"), Some(100.0));
        assert_eq!(p.parse("4吨"), None);
    }
}
