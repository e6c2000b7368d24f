//! Plain-text replies for the requester and the helpdesk ticket.

use crate::model::TicketEvaluation;
use chrono::{DateTime, SecondsFormat, Utc};

pub const PLACEHOLDER_ID: &str = "HELIX-XXXXX";

fn verdict(evaluation: &TicketEvaluation) -> &'static str {
    if evaluation.overall_passed {
        "PASSED"
    } else {
        "FAILED"
    }
}

fn id_or_placeholder(ticket_id: &str) -> &str {
    if ticket_id.trim().is_empty() {
        PLACEHOLDER_ID
    } else {
        ticket_id
    }
}

pub fn email_template(ticket_id: &str, row_count: usize, evaluation: &TicketEvaluation) -> String {
    format!(
        "Subject: Results for {id}\n\
         \n\
         Dear Requester,\n\
         \n\
         Your SQL query has been executed successfully with the following results:\n\
         \n\
         Query Results: {rows} rows returned\n\
         Criteria Evaluation: {verdict}\n\
         Details: {details}\n\
         \n\
         Please find the results attached or contact us if you need the data in a different format.\n\
         \n\
         Best regards,\n\
         Database Team",
        id = id_or_placeholder(ticket_id),
        rows = row_count,
        verdict = verdict(evaluation),
        details = evaluation.summary_message(),
    )
}

pub fn helpdesk_reply(
    ticket_id: &str,
    row_count: usize,
    evaluation: &TicketEvaluation,
    now: DateTime<Utc>,
) -> String {
    format!(
        "[Automated Response]\n\
         Ticket: {id}\n\
         Status: COMPLETED\n\
         Query executed successfully.\n\
         Results: {rows} rows returned.\n\
         Criteria evaluation: {verdict}\n\
         Details: {details}\n\
         Execution timestamp: {ts}",
        id = id_or_placeholder(ticket_id),
        rows = row_count,
        verdict = verdict(evaluation),
        details = evaluation.summary_message(),
        ts = now.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueryEvaluation;
    use chrono::TimeZone;

    fn evaluation(passed: bool) -> TicketEvaluation {
        TicketEvaluation::from_evaluations(vec![QueryEvaluation {
            query_index: 1,
            passed,
            message: "ROWCOUNT = 120 (✅ > 100)".into(),
            row_count: 120,
            results: Vec::new(),
        }])
    }

    #[test]
    fn test_email_template() {
        let text = email_template("HELIX-12345", 120, &evaluation(true));
        assert!(text.starts_with("Subject: Results for HELIX-12345\n\nDear Requester,"));
        assert!(text.contains("Query Results: 120 rows returned\nCriteria Evaluation: PASSED\n"));
        assert!(text.contains("Details: ROWCOUNT = 120 (✅ > 100)"));
        assert!(text.ends_with("Database Team"));
    }

    #[test]
    fn test_helpdesk_reply_uses_timestamp_and_placeholder() {
        let now = Utc.with_ymd_and_hms(2024, 4, 1, 9, 30, 0).unwrap();
        let text = helpdesk_reply("", 0, &evaluation(false), now);
        assert!(text.contains("Ticket: HELIX-XXXXX\n"));
        assert!(text.contains("Criteria evaluation: FAILED\n"));
        assert!(text.ends_with("Execution timestamp: 2024-04-01T09:30:00.000Z"));
    }
}
