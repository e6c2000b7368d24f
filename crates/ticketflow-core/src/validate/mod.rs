use crate::corrector::{code_only, row_limit_of, Corrector, DEFAULT_ROW_LIMIT};
use crate::criteria::CriteriaExpression;
use crate::errors::diagnostic::{codes, Diagnostic};
use crate::model::Ticket;
use crate::parser::split_statements;

const DESTRUCTIVE: [&str; 6] = ["DROP", "DELETE", "TRUNCATE", "ALTER", "UPDATE", "INSERT"];

#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// Largest `LIMIT`/`TOP` value accepted.
    pub max_row_limit: u64,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            max_row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidateReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidateReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }
}

/// Safety checks on a SQL body: destructive statements, row limits,
/// terminators and the typos the corrector knows how to fix.
pub fn validate_sql(sql: &str, corrector: &Corrector, opts: &ValidateOptions) -> ValidateReport {
    let mut diags = Vec::new();
    let statements = split_statements(sql);
    if statements.is_empty() || statements.iter().all(|s| code_only(s).trim().is_empty()) {
        diags.push(
            Diagnostic::new(codes::E_SQL_EMPTY, "no SQL statement found")
                .with_source("validate")
                .with_fix_step("Put the query in a ```sql fenced block"),
        );
        return ValidateReport { diagnostics: diags };
    }

    for (i, stmt) in statements.iter().enumerate() {
        let n = i + 1;
        let ctx = serde_json::json!({ "statement": n });
        let code = code_only(stmt);

        let destructive: Vec<&str> = keywords(&code)
            .into_iter()
            .filter_map(|w| DESTRUCTIVE.iter().copied().find(|d| d.eq_ignore_ascii_case(&w)))
            .collect();
        if !destructive.is_empty() {
            diags.push(
                Diagnostic::new(
                    codes::E_SQL_DESTRUCTIVE,
                    format!(
                        "statement {} modifies data or schema ({})",
                        n,
                        destructive.join(", ")
                    ),
                )
                .with_source("validate")
                .with_context(ctx.clone())
                .with_fix_step("Only read-only SELECT statements are executed"),
            );
        }

        match row_limit_of(&code) {
            None => diags.push(
                Diagnostic::warn(codes::W_SQL_NO_LIMIT, format!("statement {} has no row limit", n))
                    .with_source("validate")
                    .with_context(ctx.clone())
                    .with_fix_step("Run `ticketflow fix` to append a LIMIT clause"),
            ),
            Some(limit) if limit > opts.max_row_limit => diags.push(
                Diagnostic::new(
                    codes::E_SQL_LIMIT_EXCEEDED,
                    format!(
                        "statement {} limit {} exceeds the maximum of {}",
                        n, limit, opts.max_row_limit
                    ),
                )
                .with_source("validate")
                .with_context(ctx.clone()),
            ),
            Some(_) => {}
        }

        if !code.trim_end().ends_with(';') {
            diags.push(
                Diagnostic::warn(
                    codes::W_SQL_NO_TERMINATOR,
                    format!("statement {} is not terminated with ';'", n),
                )
                .with_source("validate")
                .with_context(ctx.clone()),
            );
        }

        for id in corrector.detect(stmt) {
            let description = corrector
                .rules()
                .find(|r| r.id == id)
                .map(|r| r.description)
                .unwrap_or(id);
            diags.push(
                Diagnostic::warn(codes::W_SQL_TYPO, format!("statement {}: {}", n, description))
                    .with_source("validate")
                    .with_context(serde_json::json!({ "statement": n, "rule": id }))
                    .with_fix_step("Run `ticketflow fix` to apply the correction"),
            );
        }
    }

    ValidateReport { diagnostics: diags }
}

/// SQL checks plus criteria checks for a parsed ticket.
pub fn validate_ticket(ticket: &Ticket, corrector: &Corrector, opts: &ValidateOptions) -> ValidateReport {
    let mut report = validate_sql(&ticket.sql, corrector, opts);
    let ctx = serde_json::json!({ "ticket_id": ticket.id });

    if ticket.criteria.trim().is_empty() {
        report.diagnostics.push(
            Diagnostic::new(
                codes::E_TICKET_INCOMPLETE,
                format!("ticket {} has no success criteria", ticket.id),
            )
            .with_source("validate")
            .with_context(ctx),
        );
        return report;
    }

    match CriteriaExpression::parse(&ticket.criteria) {
        Ok(expr) => {
            for m in expr.malformed() {
                report.diagnostics.push(
                    Diagnostic::warn(codes::W_CRITERIA_MALFORMED, format!("predicate {}", m))
                        .with_source("criteria")
                        .with_context(ctx.clone())
                        .with_fix_step("Predicates look like `ROWCOUNT > 100` or `MAX(sales) > 5000`"),
                );
            }
            let statements = ticket.sql_statements.len();
            if let Some(q) = expr.queries.iter().find(|q| q.query_index > statements.max(1)) {
                report.diagnostics.push(
                    Diagnostic::warn(
                        codes::W_CRITERIA_MALFORMED,
                        format!(
                            "criteria reference query {} but the ticket has {} statement(s)",
                            q.query_index, statements
                        ),
                    )
                    .with_source("criteria")
                    .with_context(ctx),
                );
            }
        }
        Err(e) => report.diagnostics.push(
            Diagnostic::new(codes::E_CRITERIA_PARSE, e.to_string())
                .with_source("criteria")
                .with_context(ctx),
        ),
    }
    report
}

/// Words of `code` outside single-quoted literals.
fn keywords(code: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for c in code.chars() {
        if c == '\'' {
            in_quote = !in_quote;
            continue;
        }
        if !in_quote && (c.is_ascii_alphanumeric() || c == '_') {
            current.push(c);
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
