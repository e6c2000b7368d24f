use crate::engine::BatchSummary;
use crate::model::{BatchItem, BatchStatus, TicketEvaluation};

fn icon(item: &BatchItem) -> &'static str {
    match item.status {
        BatchStatus::Pending => "⏳",
        BatchStatus::Processing => "🔄",
        BatchStatus::Failed => "💥",
        BatchStatus::Completed => match &item.evaluation {
            Some(e) if !e.overall_passed => "❌",
            _ => "✅",
        },
    }
}

/// Indented per-query lines; multi-query evaluations get a "k of n" header.
pub fn render_evaluation(evaluation: &TicketEvaluation) -> String {
    let mut out = String::new();
    if evaluation.evaluations.len() > 1 {
        out.push_str(&format!(
            "    {} of {} queries passed\n",
            evaluation.passed_count(),
            evaluation.evaluations.len()
        ));
        for e in &evaluation.evaluations {
            out.push_str(&format!("    Query {}: {}\n", e.query_index, e.message));
        }
    } else if let Some(e) = evaluation.evaluations.first() {
        out.push_str(&format!("    {}\n", e.message));
    }
    out
}

pub fn render_item(item: &BatchItem) -> String {
    let mut out = format!(
        "{} {:<20} {:<10} rows={}\n",
        icon(item),
        item.ticket.id,
        item.status.as_str().to_uppercase(),
        item.row_count()
    );
    if let Some(err) = &item.error {
        out.push_str(&format!("    error: {}\n", err));
    }
    if let Some(e) = &item.evaluation {
        out.push_str(&render_evaluation(e));
    }
    out
}

pub fn render_summary(summary: &BatchSummary) -> String {
    let mut line = format!(
        "Summary: {} completed, {} failed, {} pending, {} total",
        summary.completed, summary.failed, summary.pending, summary.total
    );
    if summary.cancelled {
        line.push_str(" (cancelled)");
    }
    line
}

pub fn render_batch(items: &[BatchItem], summary: &BatchSummary) -> String {
    let mut out = format!("\nProcessed {} tickets:\n", items.len());
    for item in items {
        out.push_str(&render_item(item));
    }
    out.push('\n');
    out.push_str(&render_summary(summary));
    out
}

pub fn print_batch_summary(items: &[BatchItem], summary: &BatchSummary) {
    eprintln!("{}", render_batch(items, summary));
}

pub fn print_evaluation(ticket_id: &str, evaluation: &TicketEvaluation) {
    let verdict = if evaluation.overall_passed { "✅ PASSED" } else { "❌ FAILED" };
    eprintln!("{} {}", verdict, ticket_id);
    eprint!("{}", render_evaluation(evaluation));
}
