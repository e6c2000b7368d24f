//! Extraction of structured ticket fields from free-form ticket text.
//!
//! Every field is located with an anchored search over the raw text rather
//! than a pattern engine, so each extractor can be tested on its own.

use crate::criteria::Aggregate;
use crate::errors::ParseError;
use crate::fingerprint::ticket_fingerprint;
use crate::model::Ticket;
use std::collections::HashMap;

pub const TICKET_MARKER: &str = "Ticket #";
pub const CRITERIA_MARKER: &str = "Success Criteria:";
pub const SQL_FENCE: &str = "```";
pub const BATCH_DELIMITER: &str = "---";

/// Single-ticket mode: id, SQL and criteria must all be present.
pub fn parse_ticket(text: &str) -> Result<Ticket, ParseError> {
    let id = extract_id(text).ok_or(ParseError::MissingIdentifier)?;
    let sql = extract_sql(text);
    let criteria = extract_criteria(text);

    let mut missing = Vec::new();
    if sql.is_none() {
        missing.push("sql");
    }
    if criteria.is_none() {
        missing.push("criteria");
    }
    if !missing.is_empty() {
        return Err(ParseError::IncompleteTicket {
            ticket_id: id,
            missing,
        });
    }

    Ok(build_ticket(
        id,
        text.trim(),
        sql.unwrap_or_default(),
        criteria.unwrap_or_default(),
    ))
}

/// Batch mode: splits on `---` lines and parses each section resiliently.
///
/// Sections without an id get `BATCH-<n>` (1-based over non-empty sections);
/// missing SQL or criteria leave the field empty instead of failing.
pub fn parse_batch(text: &str) -> Vec<Ticket> {
    let tickets: Vec<Ticket> = split_sections(text)
        .into_iter()
        .enumerate()
        .map(|(i, section)| parse_section(section, i + 1))
        .collect();

    warn_on_id_collisions(&tickets);
    tickets
}

/// Parses one batch section; never fails.
pub fn parse_section(section: &str, position: usize) -> Ticket {
    let id = extract_id(section).unwrap_or_else(|| format!("BATCH-{}", position));
    let sql = extract_sql(section).unwrap_or_default();
    let criteria = extract_criteria(section).unwrap_or_default();
    build_ticket(id, section.trim(), sql, criteria)
}

fn build_ticket(id: String, raw_text: &str, sql: String, criteria: String) -> Ticket {
    let sql_statements = split_statements(&sql);
    Ticket {
        id,
        raw_text: raw_text.to_string(),
        sql,
        sql_statements,
        criteria,
        is_fixed: false,
    }
}

/// Non-empty, trimmed sections between lines consisting only of `---`.
pub fn split_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim() == BATCH_DELIMITER {
            sections.push(&text[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    sections.push(&text[start..]);

    sections
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// First non-empty identifier following a `Ticket #` marker.
pub fn extract_id(text: &str) -> Option<String> {
    let mut rest = text;
    while let Some(pos) = rest.find(TICKET_MARKER) {
        let after = &rest[pos + TICKET_MARKER.len()..];
        let id: String = after
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if !id.is_empty() {
            return Some(id);
        }
        rest = after;
    }
    None
}

/// Trimmed body of the first fenced block labelled `sql`.
pub fn extract_sql(text: &str) -> Option<String> {
    let mut rest = text;
    while let Some(pos) = rest.find(SQL_FENCE) {
        let after = &rest[pos + SQL_FENCE.len()..];
        let label_len = after
            .char_indices()
            .take_while(|(_, c)| c.is_ascii_alphanumeric())
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);

        if after[..label_len].eq_ignore_ascii_case("sql") {
            let body = &after[label_len..];
            let end = body.find(SQL_FENCE)?;
            let sql = body[..end].trim();
            return if sql.is_empty() {
                None
            } else {
                Some(sql.to_string())
            };
        }

        // Not an sql fence: skip past its closing fence, if any.
        match after.find(SQL_FENCE) {
            Some(close) => rest = &after[close + SQL_FENCE.len()..],
            None => return None,
        }
    }
    None
}

/// Text after `Success Criteria:`.
///
/// A single-query criterion ends at the end of its line. When the criterion
/// uses `Query N:` clauses, following lines that continue it (another
/// `Query N:` clause, or an `AND`/aggregate continuation) are folded in; a
/// blank line or any other text ends it.
pub fn extract_criteria(text: &str) -> Option<String> {
    let pos = text.find(CRITERIA_MARKER)?;
    let after = text[pos + CRITERIA_MARKER.len()..].trim_start();

    let mut lines = after.lines();
    let first = lines.next()?.trim();
    if first.is_empty() {
        return None;
    }

    if !is_query_clause(first) {
        return Some(first.to_string());
    }

    let mut clauses = vec![first.to_string()];
    for line in lines {
        let line = line.trim();
        if !continues_criteria(line) {
            break;
        }
        clauses.push(line.to_string());
    }
    Some(clauses.join(" "))
}

fn continues_criteria(line: &str) -> bool {
    if is_query_clause(line) {
        return true;
    }
    let word: String = line
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    word.eq_ignore_ascii_case("AND") || Aggregate::from_token(&word).is_some()
}

fn is_query_clause(line: &str) -> bool {
    line.get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("query"))
}

/// Whether the line is a per-query header comment such as `-- Query 2: totals`.
pub fn is_statement_header(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix("--") else {
        return false;
    };
    let rest = rest.trim_start();
    let Some(tail) = rest.get(5..) else {
        return false;
    };
    rest[..5].eq_ignore_ascii_case("query") && tail.trim_start().starts_with(|c: char| c.is_ascii_digit())
}

/// Splits a SQL body into statements at per-query header lines.
///
/// The header stays attached to the statement it introduces. A body without
/// headers yields itself as the single statement; an empty body yields none.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        if is_statement_header(line) && !current.trim().is_empty() {
            statements.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}

pub fn is_multi_statement(sql: &str) -> bool {
    sql.lines().any(is_statement_header)
}

fn warn_on_id_collisions(tickets: &[Ticket]) {
    let mut seen: HashMap<&str, String> = HashMap::new();
    for t in tickets {
        let fp = ticket_fingerprint(t).hex;
        if let Some(prev) = seen.insert(t.id.as_str(), fp.clone()) {
            tracing::warn!(
                event = "ticketflow.parse.duplicate_id",
                ticket_id = %t.id,
                same_content = prev == fp,
                "duplicate ticket id in batch; later section wins on lookup"
            );
        }
    }
}
