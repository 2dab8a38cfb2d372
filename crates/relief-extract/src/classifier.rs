//! Evidence classification.
//!
//! Each decision (forced direction code, link tier, transport relevance,
//! direction keyword, non-transport category) is an ordered slice of
//! [`Rule`]s evaluated by [`first_match`]. Reordering a slice changes
//! outcomes on ambiguous text, so order is part of the contract.

use relief_core::models::{Category, Direction, EvidenceRow, LinkLeg, Tier};
use tracing::debug;

use crate::geo_rules::GeoRuleSet;

// ── Generic rule evaluation ───────────────────────────────────────────────────

/// A named predicate and the outcome it decides.
pub struct Rule<C, T> {
    pub name: &'static str,
    pub test: fn(&C) -> bool,
    pub outcome: T,
}

/// The first rule whose predicate holds, in slice order.
pub fn first_match<'r, C, T>(rules: &'r [Rule<C, T>], ctx: &C) -> Option<&'r Rule<C, T>> {
    rules.iter().find(|rule| (rule.test)(ctx))
}

// ── Keyword tables ────────────────────────────────────────────────────────────

pub const SHIP_KEYWORDS: &[&str] = &[
    "发运", "起运", "启运", "发出", "运出", "装船", "装车", "开航", "发往", "发去", "发至", "起运于",
    "出发",
];

pub const ARRIVAL_KEYWORDS: &[&str] = &[
    "到达", "抵达", "运到", "运至", "送达", "收到", "收讫", "到库", "入库", "验收入库", "收储", "接收",
    "交付",
];

pub const MEDIA_KEYWORDS: &[&str] = &[
    "媒体", "报刊", "电台", "广播", "专电", "通电", "呈文", "报告", "批复", "指示", "指令", "请求",
    "请拨", "请赈", "致函", "启事", "公告",
];

pub const STOCK_KEYWORDS: &[&str] = &[
    "库存", "仓", "仓库", "在库", "在途", "存粮", "存料", "转仓", "出入库", "清查", "盘点",
];

pub const BREACH_KEYWORDS: &[&str] = &["溃堤", "决口"];

pub const ALLOC_KEYWORDS: &[&str] = &[
    "拨付", "拨款", "划拨", "下拨", "经费", "款项", "募捐", "募集", "捐助", "赈济款", "赈款", "拨交",
    "拨给", "拨至",
];

pub const VDIST_KEYWORDS: &[&str] = &[
    "发放", "分发", "赈济", "救济", "救发", "配给", "配售", "按户发放", "按人发放", "按口粮", "按人口",
    "下发", "发至各村",
];

const PROVINCE_MARKERS: &[&str] = &["省"];
const PREFECTURE_MARKERS: &[&str] = &["专区", "专署", "地区", "行政督察区"];
const COUNTY_MARKERS: &[&str] = &["县", "市", "市辖区"];
const VILLAGE_MARKERS: &[&str] = &["乡", "鎭", "镇", "村", "公社", "大队", "生产队"];

// ── Row context ───────────────────────────────────────────────────────────────

/// Pre-computed views of one evidence row that every rule reads.
#[derive(Debug, Clone)]
pub struct RowContext {
    /// Upper-cased `mapped_ts_id`.
    pub ts_upper: String,
    /// Upper-cased param id, snippet and ts id, searched for direction codes.
    pub code_field: String,
    /// Excerpt followed by notes.
    pub merged: String,
    pub merged_upper: String,
    pub merged_lower: String,
}

impl RowContext {
    pub fn new(row: &EvidenceRow) -> Self {
        let ts_upper = row.mapped_ts_id.trim().to_uppercase();
        let code_field = format!(
            "{} {} {}",
            row.mapped_param_id, row.snippet_or_key, ts_upper
        )
        .to_uppercase();
        let merged = format!("{} {}", row.quote_excerpt, row.notes);
        Self {
            ts_upper,
            code_field,
            merged_upper: merged.to_uppercase(),
            merged_lower: merged.to_lowercase(),
            merged,
        }
    }

    /// Case-insensitive containment of any keyword in the merged text.
    pub fn has_any(&self, keywords: &[&str]) -> bool {
        keywords
            .iter()
            .any(|k| self.merged_lower.contains(&k.to_lowercase()))
    }

    fn mentions(&self, markers: &[&str]) -> bool {
        markers.iter().any(|m| self.merged.contains(m))
    }
}

// ── Rule tables ───────────────────────────────────────────────────────────────

/// Parameter codes that force a direction. P020 is checked first so a row
/// carrying both codes reads as an arrival.
pub const DIRECTION_CODE_RULES: &[Rule<RowContext, Direction>] = &[
    Rule {
        name: "code_p020",
        test: |c| c.code_field.contains("P020"),
        outcome: Direction::Arr,
    },
    Rule {
        name: "code_p010",
        test: |c| c.code_field.contains("P010"),
        outcome: Direction::Ship,
    },
];

/// Link-tier rules applied after the geo table.
pub const LINK_RULES: &[Rule<RowContext, Tier>] = &[
    Rule {
        name: "ts_zp",
        test: |c| c.ts_upper.contains("ZP"),
        outcome: Tier::Zp,
    },
    Rule {
        name: "ts_pc",
        test: |c| c.ts_upper.contains("PC"),
        outcome: Tier::Pc,
    },
    Rule {
        name: "ts_cv",
        test: |c| c.ts_upper.contains("CV"),
        outcome: Tier::Cv,
    },
    Rule {
        name: "text_zp",
        test: |c| c.merged_upper.contains("ZP"),
        outcome: Tier::Zp,
    },
    Rule {
        name: "text_pc",
        test: |c| c.merged_upper.contains("PC"),
        outcome: Tier::Pc,
    },
    Rule {
        name: "text_cv",
        test: |c| c.merged_upper.contains("CV"),
        outcome: Tier::Cv,
    },
    Rule {
        name: "province_prefecture",
        test: |c| {
            c.mentions(PROVINCE_MARKERS)
                && c.mentions(PREFECTURE_MARKERS)
                && !c.mentions(COUNTY_MARKERS)
        },
        outcome: Tier::Zp,
    },
    Rule {
        name: "prefecture_county",
        test: |c| {
            c.mentions(PREFECTURE_MARKERS)
                && c.mentions(COUNTY_MARKERS)
                && !c.mentions(VILLAGE_MARKERS)
        },
        outcome: Tier::Pc,
    },
    Rule {
        name: "county_village",
        test: |c| c.mentions(COUNTY_MARKERS) && c.mentions(VILLAGE_MARKERS),
        outcome: Tier::Cv,
    },
];

/// Markers that make a row transport-relevant. A forced direction code also
/// does, and is checked separately.
pub const TRANSPORT_RULES: &[Rule<RowContext, ()>] = &[
    Rule {
        name: "ts_link",
        test: |c| c.ts_upper.contains("LINK"),
        outcome: (),
    },
    Rule {
        name: "transport_word",
        test: |c| c.merged_lower.contains("运输") || c.merged_lower.contains('运'),
        outcome: (),
    },
    Rule {
        name: "direction_keyword",
        test: |c| c.has_any(SHIP_KEYWORDS) || c.has_any(ARRIVAL_KEYWORDS),
        outcome: (),
    },
];

/// Direction keywords, consulted only when no code forced a direction.
pub const DIRECTION_KEYWORD_RULES: &[Rule<RowContext, Direction>] = &[
    Rule {
        name: "ship_keyword",
        test: |c| c.has_any(SHIP_KEYWORDS),
        outcome: Direction::Ship,
    },
    Rule {
        name: "arrival_keyword",
        test: |c| c.has_any(ARRIVAL_KEYWORDS),
        outcome: Direction::Arr,
    },
];

/// Cascade for rows that are not transport legs. Ends in a catch-all.
pub const CATEGORY_RULES: &[Rule<RowContext, Category>] = &[
    Rule {
        name: "media",
        test: |c| c.ts_upper.contains("MEDIA") || c.ts_upper.contains("REQ") || c.has_any(MEDIA_KEYWORDS),
        outcome: Category::MediaReq,
    },
    Rule {
        name: "stock",
        test: |c| c.ts_upper.contains("STOCK") || c.has_any(STOCK_KEYWORDS),
        outcome: Category::Stocks,
    },
    Rule {
        name: "breach",
        test: |c| c.ts_upper.contains("BREACH") || c.has_any(BREACH_KEYWORDS),
        outcome: Category::Breach,
    },
    Rule {
        name: "alloc",
        test: |c| c.ts_upper.contains("ALLOC") || c.has_any(ALLOC_KEYWORDS),
        outcome: Category::Alloc,
    },
    Rule {
        name: "village_distribution",
        test: |c| {
            c.ts_upper.contains("V_DIST") || c.ts_upper.contains("VILLAGE") || c.has_any(VDIST_KEYWORDS)
        },
        outcome: Category::VDist,
    },
    Rule {
        name: "misc",
        test: |_| true,
        outcome: Category::Misc,
    },
];

// ── Classifier ────────────────────────────────────────────────────────────────

/// Category assigned to a row and the name of the rule that decided it.
///
/// A link category may still carry unresolved tier or direction here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub rule: &'static str,
}

/// Runs the cascade for one row against a loaded geo-rule table.
pub struct EvidenceClassifier<'g> {
    geo_rules: &'g GeoRuleSet,
}

impl<'g> EvidenceClassifier<'g> {
    pub fn new(geo_rules: &'g GeoRuleSet) -> Self {
        Self { geo_rules }
    }

    /// Link tier: geo table first, then [`LINK_RULES`].
    pub fn decide_tier(&self, ctx: &RowContext) -> Option<Tier> {
        self.geo_rules
            .first_match(&ctx.merged)
            .or_else(|| first_match(LINK_RULES, ctx).map(|r| r.outcome))
    }

    pub fn classify(&self, row: &EvidenceRow) -> Classification {
        let ctx = RowContext::new(row);
        let forced = first_match(DIRECTION_CODE_RULES, &ctx);

        let transport = forced.is_some() || first_match(TRANSPORT_RULES, &ctx).is_some();
        if transport {
            let tier = self.decide_tier(&ctx);
            let direction_rule = forced.or_else(|| first_match(DIRECTION_KEYWORD_RULES, &ctx));
            let direction = direction_rule.map(|r| r.outcome);
            let classification = Classification {
                category: Category::Link(LinkLeg::new(tier, direction)),
                rule: direction_rule.map(|r| r.name).unwrap_or("unresolved_direction"),
            };
            debug!(
                ts_id = %row.mapped_ts_id,
                category = %classification.category,
                rule = classification.rule,
                "classified transport row"
            );
            return classification;
        }

        match first_match(CATEGORY_RULES, &ctx) {
            Some(rule) => Classification {
                category: rule.outcome,
                rule: rule.name,
            },
            None => Classification {
                category: Category::Misc,
                rule: "misc",
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ts: &str, param: &str, excerpt: &str, notes: &str) -> EvidenceRow {
        EvidenceRow {
            mapped_ts_id: ts.to_string(),
            mapped_param_id: param.to_string(),
            quote_excerpt: excerpt.to_string(),
            notes: notes.to_string(),
            ..EvidenceRow::default()
        }
    }

    fn classify(r: &EvidenceRow) -> Category {
        let geo = GeoRuleSet::empty();
        EvidenceClassifier::new(&geo).classify(r).category
    }

    // ── first_match ───────────────────────────────────────────────────────────

    #[test]
    fn test_first_match_returns_earliest_rule() {
        let rules: [Rule<i32, &str>; 3] = [
            Rule { name: "neg", test: |x| *x < 0, outcome: "negative" },
            Rule { name: "small", test: |x| *x < 10, outcome: "small" },
            Rule { name: "any", test: |_| true, outcome: "large" },
        ];
        assert_eq!(first_match(&rules, &-3).map(|r| r.outcome), Some("negative"));
        assert_eq!(first_match(&rules, &3).map(|r| r.name), Some("small"));
        assert_eq!(first_match(&rules, &30).map(|r| r.outcome), Some("large"));
        assert!(first_match(&rules[..0], &1).is_none());
    }

    // ── Direction ─────────────────────────────────────────────────────────────

    #[test]
    fn test_code_forces_direction_over_keywords() {
        // Arrival code wins over a dispatch keyword.
        let r = row("LINK_PC", "P020", "七月初十发运", "");
        assert_eq!(classify(&r), Category::link(Tier::Pc, Direction::Arr));
        let r = row("LINK_PC", "P010", "七月初十到达", "");
        assert_eq!(classify(&r), Category::link(Tier::Pc, Direction::Ship));
    }

    #[test]
    fn test_code_alone_makes_row_transport() {
        let r = row("X", "P010", "", "");
        assert_eq!(
            classify(&r),
            Category::Link(LinkLeg::new(None, Some(Direction::Ship)))
        );
    }

    #[test]
    fn test_ship_keyword_beats_arrival_keyword() {
        let r = row("LINK_CV", "", "发运后到达", "");
        assert_eq!(classify(&r), Category::link(Tier::Cv, Direction::Ship));
    }

    #[test]
    fn test_transport_without_direction_is_unresolved() {
        let r = row("LINK_ZP", "", "运输中", "");
        assert_eq!(
            classify(&r),
            Category::Link(LinkLeg::new(Some(Tier::Zp), None))
        );
    }

    // ── Link tier ─────────────────────────────────────────────────────────────

    #[test]
    fn test_geo_rule_overrides_ts_code() {
        let geo = GeoRuleSet::from_pairs([("汉口", "CV")]);
        let r = row("LINK_ZP", "", "运抵汉口", "");
        let c = EvidenceClassifier::new(&geo).classify(&r);
        assert_eq!(c.category.as_link().and_then(|l| l.tier), Some(Tier::Cv));
    }

    #[test]
    fn test_ts_code_beats_text_code() {
        let r = row("LINK_PC", "", "CV 发运", "");
        assert_eq!(classify(&r), Category::link(Tier::Pc, Direction::Ship));
    }

    #[test]
    fn test_text_code_when_ts_has_none() {
        let r = row("LINK", "", "zp段 发运", "");
        assert_eq!(classify(&r), Category::link(Tier::Zp, Direction::Ship));
    }

    #[test]
    fn test_hierarchy_heuristic() {
        let r = row("LINK", "", "自省城发往专区", "");
        assert_eq!(classify(&r), Category::link(Tier::Zp, Direction::Ship));
        let r = row("LINK", "", "专署运至各县", "");
        assert_eq!(classify(&r), Category::link(Tier::Pc, Direction::Arr));
        let r = row("LINK", "", "县仓发往各乡", "");
        assert_eq!(classify(&r), Category::link(Tier::Cv, Direction::Ship));
        let r = row("LINK", "", "发运", "");
        assert_eq!(
            classify(&r),
            Category::Link(LinkLeg::new(None, Some(Direction::Ship)))
        );
    }

    // ── Non-transport cascade ─────────────────────────────────────────────────

    #[test]
    fn test_media_before_stock() {
        let r = row("", "", "报告仓库存粮", "");
        assert_eq!(classify(&r), Category::MediaReq);
    }

    #[test]
    fn test_stock_before_breach() {
        let r = row("", "", "决口后清查存粮", "");
        assert_eq!(classify(&r), Category::Stocks);
    }

    #[test]
    fn test_breach_and_alloc() {
        assert_eq!(classify(&row("", "", "八月下旬溃堤", "")), Category::Breach);
        assert_eq!(classify(&row("BREACH", "", "", "")), Category::Breach);
        assert_eq!(classify(&row("", "", "拨款五千元", "")), Category::Alloc);
    }

    #[test]
    fn test_village_distribution_and_misc() {
        assert_eq!(classify(&row("", "", "按户发放", "")), Category::VDist);
        assert_eq!(classify(&row("VILLAGE", "", "", "")), Category::VDist);
        assert_eq!(classify(&row("OTHER", "", "天晴", "")), Category::Misc);
    }

    #[test]
    fn test_notes_are_searched_too() {
        let r = row("", "", "七月初十", "呈文请赈");
        assert_eq!(classify(&r), Category::MediaReq);
    }

    #[test]
    fn test_rule_name_is_reported() {
        let geo = GeoRuleSet::empty();
        let c = EvidenceClassifier::new(&geo).classify(&row("", "", "盘点", ""));
        assert_eq!(c.rule, "stock");
        let c = EvidenceClassifier::new(&geo).classify(&row("LINK_PC", "P010", "", ""));
        assert_eq!(c.rule, "code_p010");
    }
}
