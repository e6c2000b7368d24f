pub mod diagnostic;
pub mod similarity;

pub use diagnostic::Diagnostic;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Failure to turn single-ticket text into a complete ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    MissingIdentifier,
    IncompleteTicket {
        ticket_id: String,
        missing: Vec<&'static str>,
    },
}

impl ParseError {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::IncompleteTicket { .. })
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingIdentifier => {
                write!(f, "no 'Ticket #<id>' marker found in ticket text")
            }
            ParseError::IncompleteTicket { ticket_id, missing } => write!(
                f,
                "ticket {} is incomplete: missing {}",
                ticket_id,
                missing.join(", ")
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Structural criteria failures. Single bad predicates never surface here.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaError {
    Empty,
    InvalidQueryIndex(String),
    Unparseable {
        expression: String,
        reasons: Vec<String>,
    },
}

impl fmt::Display for CriteriaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriteriaError::Empty => write!(f, "criteria expression is empty"),
            CriteriaError::InvalidQueryIndex(clause) => {
                write!(f, "invalid query index in clause '{}' (queries start at 1)", clause)
            }
            CriteriaError::Unparseable {
                expression,
                reasons,
            } => write!(
                f,
                "criteria expression '{}' could not be parsed: {}",
                expression,
                reasons.join("; ")
            ),
        }
    }
}

impl std::error::Error for CriteriaError {}

/// Maps a core error to a diagnostic when it is one of ours.
pub fn try_map_error(err: &anyhow::Error) -> Option<Diagnostic> {
    use diagnostic::codes;

    if let Some(e) = err.downcast_ref::<ParseError>() {
        let code = match e {
            ParseError::MissingIdentifier => codes::E_TICKET_NO_ID,
            ParseError::IncompleteTicket { .. } => codes::E_TICKET_INCOMPLETE,
        };
        return Some(
            Diagnostic::new(code, e.to_string())
                .with_source("parser")
                .with_fix_step("Ticket text needs 'Ticket #<id>', a ```sql block and a 'Success Criteria:' line"),
        );
    }
    if let Some(e) = err.downcast_ref::<CriteriaError>() {
        return Some(Diagnostic::new(codes::E_CRITERIA_PARSE, e.to_string()).with_source("criteria"));
    }
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        return Some(Diagnostic::new(codes::E_CFG_PARSE, e.0.clone()).with_source("config"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_lists_missing_parts() {
        let e = ParseError::IncompleteTicket {
            ticket_id: "HELIX-1".into(),
            missing: vec!["sql", "criteria"],
        };
        assert_eq!(e.to_string(), "ticket HELIX-1 is incomplete: missing sql, criteria");
        assert!(e.is_incomplete());
        assert!(!ParseError::MissingIdentifier.is_incomplete());
    }

    #[test]
    fn test_try_map_error_recognizes_core_errors() {
        let err = anyhow::Error::new(ParseError::MissingIdentifier);
        let diag = try_map_error(&err).unwrap();
        assert_eq!(diag.code, diagnostic::codes::E_TICKET_NO_ID);

        let err = anyhow::anyhow!("something else");
        assert!(try_map_error(&err).is_none());
    }
}
