use regex::{Regex, RegexBuilder};

/// One substitution rule. Patterns match case-insensitively and every match
/// is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub id: &'static str,
    pub description: &'static str,
    pub pattern: &'static str,
    pub replacement: &'static str,
}

/// Ordered rule table. Later rules see the output of earlier ones, e.g. the
/// `SELECT *` expansion only matches once the keyword typos are gone.
pub const RULES: &[Rule] = &[
    Rule {
        id: "typo.select",
        description: "SELCT -> SELECT",
        pattern: r"\bSELCT\b",
        replacement: "SELECT",
    },
    Rule {
        id: "typo.from",
        description: "FORM -> FROM",
        pattern: r"\bFORM\b",
        replacement: "FROM",
    },
    Rule {
        id: "typo.where",
        description: "WEHERE/WHRE -> WHERE",
        pattern: r"\b(?:WEHERE|WHRE)\b",
        replacement: "WHERE",
    },
    Rule {
        id: "typo.group_by",
        description: "GROPU BY -> GROUP BY",
        pattern: r"\bGROPU\s+BY\b",
        replacement: "GROUP BY",
    },
    Rule {
        id: "typo.order_by",
        description: "ORDR BY -> ORDER BY",
        pattern: r"\bORDR\s+BY\b",
        replacement: "ORDER BY",
    },
    Rule {
        id: "typo.between",
        description: "BETWEN -> BETWEEN",
        pattern: r"\bBETWEN\b",
        replacement: "BETWEEN",
    },
    Rule {
        id: "region.west",
        description: "region literal 'west' -> 'West'",
        pattern: r"'west'",
        replacement: "'West'",
    },
    Rule {
        id: "region.east",
        description: "region literal 'east' -> 'East'",
        pattern: r"'east'",
        replacement: "'East'",
    },
    Rule {
        id: "region.north",
        description: "region literal 'north' -> 'North'",
        pattern: r"'north'",
        replacement: "'North'",
    },
    Rule {
        id: "region.south",
        description: "region literal 'south' -> 'South'",
        pattern: r"'south'",
        replacement: "'South'",
    },
    Rule {
        id: "select_star.orders",
        description: "SELECT * FROM orders -> explicit column list",
        pattern: r"\bSELECT\s+\*\s+FROM\s+orders\b",
        replacement: "SELECT product_id, sales, region, date FROM orders",
    },
    Rule {
        id: "date.slashed_iso",
        description: "'YYYY/MM/DD' -> 'YYYY-MM-DD'",
        pattern: r"'(\d{4})/(\d{2})/(\d{2})'",
        replacement: "'$1-$2-$3'",
    },
    Rule {
        id: "date.us",
        description: "'MM/DD/YYYY' -> 'YYYY-MM-DD'",
        pattern: r"'(\d{2})/(\d{2})/(\d{4})'",
        replacement: "'$3-$1-$2'",
    },
    Rule {
        id: "date.compact",
        description: "'YYYYMMDD' -> 'YYYY-MM-DD'",
        pattern: r"'((?:19|20)\d{2})(0[1-9]|1[0-2])(0[1-9]|[12]\d|3[01])'",
        replacement: "'$1-$2-$3'",
    },
];

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    regex: Regex,
}

impl CompiledRule {
    pub fn compile(rule: Rule) -> anyhow::Result<Self> {
        let regex = RegexBuilder::new(rule.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid correction rule '{}': {}", rule.id, e))?;
        Ok(Self { rule, regex })
    }

    /// Replaces every match; `None` when the rule leaves the text unchanged.
    pub fn apply(&self, text: &str) -> Option<String> {
        if !self.regex.is_match(text) {
            return None;
        }
        let out = self.regex.replace_all(text, self.rule.replacement);
        if out == text {
            return None;
        }
        Some(out.into_owned())
    }
}

pub fn compile_all(rules: &[Rule]) -> anyhow::Result<Vec<CompiledRule>> {
    rules.iter().copied().map(CompiledRule::compile).collect()
}
