use serde::{Deserialize, Serialize};
use std::fmt;

pub mod codes {
    pub const E_CFG_PARSE: &str = "E_CFG_PARSE";
    pub const E_TICKET_NO_ID: &str = "E_TICKET_NO_ID";
    pub const E_TICKET_INCOMPLETE: &str = "E_TICKET_INCOMPLETE";
    pub const E_CRITERIA_PARSE: &str = "E_CRITERIA_PARSE";
    pub const W_CRITERIA_MALFORMED: &str = "W_CRITERIA_MALFORMED";
    pub const E_SQL_EMPTY: &str = "E_SQL_EMPTY";
    pub const E_SQL_DESTRUCTIVE: &str = "E_SQL_DESTRUCTIVE";
    pub const E_SQL_LIMIT_EXCEEDED: &str = "E_SQL_LIMIT_EXCEEDED";
    pub const W_SQL_NO_LIMIT: &str = "W_SQL_NO_LIMIT";
    pub const W_SQL_TYPO: &str = "W_SQL_TYPO";
    pub const W_SQL_NO_TERMINATOR: &str = "W_SQL_NO_TERMINATOR";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: String, // "error" | "warn"
    pub message: String,
    pub source: String,
    #[serde(default)]
    pub context: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fix_steps: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: "error".to_string(),
            message: message.into(),
            source: "ticketflow".to_string(),
            context: serde_json::json!({}),
            fix_steps: Vec::new(),
        }
    }

    pub fn warn(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message).with_severity("warn")
    }

    pub fn with_severity(mut self, severity: &str) -> Self {
        self.severity = severity.to_string();
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_fix_step(mut self, step: impl Into<String>) -> Self {
        self.fix_steps.push(step.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }

    pub fn format_terminal(&self) -> String {
        let icon = if self.is_error() { "✖" } else { "⚠" };
        let mut out = format!("{} [{}] {} ({})", icon, self.code, self.message, self.source);
        for step in &self.fix_steps {
            out.push_str(&format!("\n    fix: {}", step));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for Diagnostic {}
