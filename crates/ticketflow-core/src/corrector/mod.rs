//! Deterministic SQL repair.
//!
//! A correction pass runs the ordered rule table over every statement, adds
//! a row limit and terminator where missing, then lays the statement out.

pub mod format;
pub mod history;
pub mod rules;

pub use history::SqlHistory;

use crate::model::Ticket;
use crate::parser::split_statements;
use format::Segment;
use rules::{CompiledRule, Rule, RULES};
use serde::Serialize;

pub const DEFAULT_ROW_LIMIT: u64 = 1000;
pub const RULE_LIMIT_APPEND: &str = "limit.append";
pub const RULE_TERMINATOR: &str = "terminator.append";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectorOptions {
    pub row_limit: u64,
    pub reformat: bool,
}

impl Default for CorrectorOptions {
    fn default() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
            reformat: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub sql: String,
    /// Ids of the rules that changed something, in first-applied order.
    pub applied_rules: Vec<String>,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct Corrector {
    rules: Vec<CompiledRule>,
    opts: CorrectorOptions,
}

impl Corrector {
    pub fn new(opts: CorrectorOptions) -> anyhow::Result<Self> {
        Ok(Self {
            rules: rules::compile_all(RULES)?,
            opts,
        })
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Self::new(CorrectorOptions::default())
    }

    pub fn options(&self) -> &CorrectorOptions {
        &self.opts
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|r| &r.rule)
    }

    pub fn correct(&self, sql: &str) -> Correction {
        let mut applied: Vec<String> = Vec::new();
        let statements: Vec<String> = split_statements(sql)
            .iter()
            .map(|stmt| self.correct_statement(stmt, &mut applied))
            .collect();

        let out = statements.join("\n\n");
        Correction {
            changed: out != sql,
            sql: out,
            applied_rules: applied,
        }
    }

    /// Ids of the substitution rules that would change `sql`, without applying them.
    pub fn detect(&self, sql: &str) -> Vec<&'static str> {
        let code = code_only(sql);
        self.rules
            .iter()
            .filter(|r| r.apply(&code).is_some())
            .map(|r| r.rule.id)
            .collect()
    }

    /// Corrects the ticket's SQL in place, recording the previous text in
    /// `history` when anything changed.
    pub fn fix_ticket(&self, ticket: &mut Ticket, history: Option<&mut SqlHistory>) -> Correction {
        let correction = self.correct(&ticket.sql);
        if correction.changed {
            if let Some(h) = history {
                h.record(ticket.sql.clone());
            }
            ticket.set_sql(&correction.sql);
            ticket.is_fixed = true;
            tracing::debug!(
                event = "ticketflow.correct",
                ticket_id = %ticket.id,
                rules = ?correction.applied_rules,
            );
        }
        correction
    }

    fn correct_statement(&self, statement: &str, applied: &mut Vec<String>) -> String {
        let mut segments = format::segments(statement);

        for seg in segments.iter_mut() {
            if let Segment::Code(code) = seg {
                for rule in &self.rules {
                    if let Some(fixed) = rule.apply(code) {
                        *code = fixed;
                        note(applied, rule.rule.id);
                    }
                }
            }
        }

        let all_code = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Code(c) => Some(c.as_str()),
                Segment::Comment(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        let last_code = segments.iter_mut().rev().find_map(|s| match s {
            Segment::Code(c) => Some(c),
            Segment::Comment(_) => None,
        });

        // Comment-only statements are left alone.
        if let Some(code) = last_code {
            let body = code.trim_end().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
            let had_single_terminator =
                code.trim_end().ends_with(';') && !code.trim_end().ends_with(";;");

            let mut fixed = body.to_string();
            if row_limit_of(&all_code).is_none() {
                fixed.push_str(&format!(" LIMIT {}", self.opts.row_limit));
                note(applied, RULE_LIMIT_APPEND);
            }
            if !had_single_terminator {
                note(applied, RULE_TERMINATOR);
            }
            fixed.push(';');
            *code = fixed;
        }

        if self.opts.reformat {
            for seg in segments.iter_mut() {
                if let Segment::Code(code) = seg {
                    *code = format::format_code(code);
                }
            }
        }

        format::render(&segments)
    }
}

fn note(applied: &mut Vec<String>, id: &str) {
    if !applied.iter().any(|a| a == id) {
        applied.push(id.to_string());
    }
}

/// The statement text with every `--` comment removed, whole-line or trailing.
pub fn code_only(sql: &str) -> String {
    sql.lines()
        .map(|l| format::split_comment(l).0.trim_end())
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Value of the first `LIMIT n` or `TOP n` clause outside comments.
pub fn row_limit_of(sql: &str) -> Option<u64> {
    let code = code_only(sql);
    let words: Vec<&str> = code
        .split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ';' | ','))
        .filter(|w| !w.is_empty())
        .collect();

    words.windows(2).find_map(|w| {
        if w[0].eq_ignore_ascii_case("LIMIT") || w[0].eq_ignore_ascii_case("TOP") {
            w[1].parse::<u64>().ok()
        } else {
            None
        }
    })
}
