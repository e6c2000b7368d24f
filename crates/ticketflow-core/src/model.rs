use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single cell value returned by the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view of the value. Text that parses as a number counts as numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
            Scalar::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

pub type Row = BTreeMap<String, Scalar>;
pub type ResultSet = Vec<Row>;

/// Result sets of one ticket keyed by 1-based query index.
pub type ResultsByQuery = BTreeMap<usize, ResultSet>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub sql_statements: Vec<String>,
    #[serde(default)]
    pub criteria: String,
    #[serde(default)]
    pub is_fixed: bool,
}

impl Ticket {
    pub fn has_sql(&self) -> bool {
        !self.sql_statements.is_empty()
    }

    pub fn is_multi_query(&self) -> bool {
        self.sql_statements.len() > 1
    }

    /// Replaces the SQL body and re-derives the statement list.
    pub fn set_sql(&mut self, sql: &str) {
        self.sql = sql.trim().to_string();
        self.sql_statements = crate::parser::split_statements(&self.sql);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvaluation {
    pub query_index: usize,
    pub passed: bool,
    pub message: String,
    pub row_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: ResultSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketEvaluation {
    pub evaluations: Vec<QueryEvaluation>,
    pub overall_passed: bool,
}

impl TicketEvaluation {
    pub fn from_evaluations(evaluations: Vec<QueryEvaluation>) -> Self {
        let overall_passed = !evaluations.is_empty() && evaluations.iter().all(|e| e.passed);
        Self {
            evaluations,
            overall_passed,
        }
    }

    /// Evaluation for a criteria expression that could not be parsed at all.
    pub fn unparseable(message: impl Into<String>) -> Self {
        Self {
            evaluations: vec![QueryEvaluation {
                query_index: 1,
                passed: false,
                message: message.into(),
                row_count: 0,
                results: Vec::new(),
            }],
            overall_passed: false,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.evaluations.iter().filter(|e| e.passed).count()
    }

    pub fn get(&self, query_index: usize) -> Option<&QueryEvaluation> {
        self.evaluations
            .iter()
            .find(|e| e.query_index == query_index)
    }

    /// Single-line explanation covering every query.
    pub fn summary_message(&self) -> String {
        if self.evaluations.len() == 1 {
            return self.evaluations[0].message.clone();
        }
        self.evaluations
            .iter()
            .map(|e| format!("Query {}: {}", e.query_index, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }

    /// Forward-only lifecycle: Pending -> Processing -> Completed | Failed.
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Pending, BatchStatus::Processing)
                | (BatchStatus::Processing, BatchStatus::Completed)
                | (BatchStatus::Processing, BatchStatus::Failed)
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub ticket: Ticket,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<TicketEvaluation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results: ResultsByQuery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn pending(ticket: Ticket) -> Self {
        Self {
            ticket,
            status: BatchStatus::Pending,
            evaluation: None,
            results: BTreeMap::new(),
            error: None,
        }
    }

    /// Fresh Pending record for the same ticket, used to re-run a batch.
    pub fn requeue(&self) -> Self {
        Self::pending(self.ticket.clone())
    }

    /// Returns a copy of this item moved to `next`, refusing backward moves.
    pub fn transitioned(&self, next: BatchStatus) -> anyhow::Result<Self> {
        if !self.status.can_transition_to(next) {
            anyhow::bail!(
                "invalid status transition for ticket {}: {} -> {}",
                self.ticket.id,
                self.status,
                next
            );
        }
        let mut item = self.clone();
        item.status = next;
        Ok(item)
    }

    /// Total rows over every query of the ticket.
    pub fn row_count(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }
}
