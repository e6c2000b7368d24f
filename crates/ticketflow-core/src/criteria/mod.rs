//! Success-criteria expressions.
//!
//! Grammar: `[Query <n>:] <AGG>[(<column>)] <cmp> <number> (AND ...)*`,
//! with query clauses separated by `;`. Only `AND` is supported between
//! predicates.

pub mod aggregate;
pub mod eval;
pub mod parse;

pub use eval::{evaluate, evaluate_text};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregate {
    RowCount,
    Min,
    Max,
    Avg,
    Sum,
    Count,
}

impl Aggregate {
    pub const ALL: [Aggregate; 6] = [
        Aggregate::RowCount,
        Aggregate::Min,
        Aggregate::Max,
        Aggregate::Avg,
        Aggregate::Sum,
        Aggregate::Count,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::RowCount => "ROWCOUNT",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
            Aggregate::Avg => "AVG",
            Aggregate::Sum => "SUM",
            Aggregate::Count => "COUNT",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(token))
    }

    /// MIN/MAX/AVG/SUM are meaningless without a column.
    pub fn requires_column(&self) -> bool {
        matches!(
            self,
            Aggregate::Min | Aggregate::Max | Aggregate::Avg | Aggregate::Sum
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Eq => "=",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
        }
    }

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Gt => lhs > rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Eq => lhs == rhs,
            Comparator::Ge => lhs >= rhs,
            Comparator::Le => lhs <= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub aggregate: Aggregate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl Predicate {
    /// `ROWCOUNT` or `MAX(sales)`.
    pub fn label(&self) -> String {
        match (&self.aggregate, &self.column) {
            (Aggregate::RowCount, _) | (_, None) => self.aggregate.name().to_string(),
            (agg, Some(col)) => format!("{}({})", agg.name(), col),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.label(),
            self.comparator.symbol(),
            format_number(self.threshold)
        )
    }
}

/// A predicate that could not be understood; it always evaluates as failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalformedPredicate {
    pub text: String,
    pub reason: String,
}

impl fmt::Display for MalformedPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.text, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    Predicate(Predicate),
    Malformed(MalformedPredicate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCriterion {
    pub query_index: usize,
    pub predicates: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaExpression {
    pub queries: Vec<QueryCriterion>,
}

impl CriteriaExpression {
    pub fn parse(text: &str) -> Result<Self, crate::errors::CriteriaError> {
        parse::parse_expression(text)
    }

    pub fn is_multi_query(&self) -> bool {
        self.queries.len() > 1
    }

    pub fn malformed(&self) -> impl Iterator<Item = &MalformedPredicate> {
        self.queries.iter().flat_map(|q| {
            q.predicates.iter().filter_map(|c| match c {
                Clause::Malformed(m) => Some(m),
                Clause::Predicate(_) => None,
            })
        })
    }
}

impl std::str::FromStr for CriteriaExpression {
    type Err = crate::errors::CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Integers print without a fraction, everything else with two decimals.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{:.2}", n)
    }
}
