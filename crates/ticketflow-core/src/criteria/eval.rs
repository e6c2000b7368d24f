use super::aggregate::compute;
use super::{format_number, Clause, CriteriaExpression, Predicate, QueryCriterion};
use crate::errors::CriteriaError;
use crate::model::{QueryEvaluation, ResultsByQuery, TicketEvaluation};

pub const NO_RESULTS: &str = "No results";

/// Evaluates every query criterion against its result set.
///
/// A query with no rows fails with `No results` without looking at its
/// predicates. Malformed predicates fail closed and are reported in the
/// message instead of aborting the evaluation.
pub fn evaluate(expr: &CriteriaExpression, results: &ResultsByQuery) -> TicketEvaluation {
    let evaluations = expr
        .queries
        .iter()
        .map(|q| evaluate_query(q, results))
        .collect();
    TicketEvaluation::from_evaluations(evaluations)
}

/// Parses and evaluates in one step; only structural criteria errors escape.
pub fn evaluate_text(criteria: &str, results: &ResultsByQuery) -> Result<TicketEvaluation, CriteriaError> {
    let expr = CriteriaExpression::parse(criteria)?;
    Ok(evaluate(&expr, results))
}

fn evaluate_query(criterion: &QueryCriterion, results: &ResultsByQuery) -> QueryEvaluation {
    let rows = results
        .get(&criterion.query_index)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    if rows.is_empty() {
        return QueryEvaluation {
            query_index: criterion.query_index,
            passed: false,
            message: NO_RESULTS.to_string(),
            row_count: 0,
            results: Vec::new(),
        };
    }

    let mut passed = true;
    let mut parts = Vec::with_capacity(criterion.predicates.len());
    for clause in &criterion.predicates {
        let (ok, part) = match clause {
            Clause::Predicate(p) => check(p, rows),
            Clause::Malformed(m) => (false, format!("❌ malformed predicate {}", m)),
        };
        passed &= ok;
        parts.push(part);
    }

    tracing::debug!(
        event = "ticketflow.criteria.query",
        query_index = criterion.query_index,
        rows = rows.len(),
        passed,
    );

    QueryEvaluation {
        query_index: criterion.query_index,
        passed,
        message: parts.join(", "),
        row_count: rows.len(),
        results: rows.to_vec(),
    }
}

fn check(p: &Predicate, rows: &[crate::model::Row]) -> (bool, String) {
    let value = compute(p.aggregate, p.column.as_deref(), rows);
    let ok = p.comparator.holds(value, p.threshold);
    let part = format!(
        "{} = {} ({} {} {})",
        p.label(),
        format_number(value),
        if ok { "✅" } else { "❌" },
        p.comparator.symbol(),
        format_number(p.threshold)
    );
    (ok, part)
}
