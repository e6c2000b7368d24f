use super::executor::{QueryExecutor, QueryRequest};
use crate::model::ResultSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Canned outcome for one ticket: either one result set per query, or a
/// failure message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketScenario {
    pub ticket_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub queries: Vec<ResultSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TicketScenario {
    pub fn result_for(&self, query_index: usize) -> Option<&ResultSet> {
        query_index
            .checked_sub(1)
            .and_then(|i| self.queries.get(i))
    }
}

pub trait ScenarioSource: Send + Sync {
    fn lookup(&self, ticket_id: &str) -> Option<&TicketScenario>;
    fn ticket_ids(&self) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    #[serde(default)]
    scenarios: Vec<TicketScenario>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryScenarios {
    by_id: HashMap<String, TicketScenario>,
}

impl InMemoryScenarios {
    pub fn from_vec(scenarios: Vec<TicketScenario>) -> anyhow::Result<Self> {
        let mut by_id = HashMap::with_capacity(scenarios.len());
        for s in scenarios {
            if s.ticket_id.trim().is_empty() {
                anyhow::bail!("scenario without ticket_id");
            }
            if by_id.contains_key(&s.ticket_id) {
                anyhow::bail!("duplicate scenario for ticket '{}'", s.ticket_id);
            }
            by_id.insert(s.ticket_id.clone(), s);
        }
        Ok(Self { by_id })
    }

    /// Loads a `scenarios:` fixture file. YAML and JSON are both accepted.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("failed to read scenario file '{}': {}", path.display(), e)
        })?;
        let file: ScenarioFile = serde_yaml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid scenario file '{}': {}", path.display(), e))?;

        let source = Self::from_vec(file.scenarios)?;
        tracing::info!(
            event = "ticketflow.scenarios.loaded",
            path = %path.display(),
            count = source.by_id.len(),
        );
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl ScenarioSource for InMemoryScenarios {
    fn lookup(&self, ticket_id: &str) -> Option<&TicketScenario> {
        self.by_id.get(ticket_id)
    }

    fn ticket_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_id.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Answers queries from canned scenarios keyed by ticket id. Tickets without
/// a scenario go to `fallback` when one is set, and fail otherwise.
#[derive(Clone)]
pub struct ScenarioExecutor {
    source: Arc<dyn ScenarioSource>,
    fallback: Option<Arc<dyn QueryExecutor>>,
}

impl ScenarioExecutor {
    pub fn new(source: Arc<dyn ScenarioSource>) -> Self {
        Self {
            source,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn QueryExecutor>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[async_trait]
impl QueryExecutor for ScenarioExecutor {
    async fn execute(&self, req: &QueryRequest<'_>) -> anyhow::Result<ResultSet> {
        match self.source.lookup(req.ticket_id) {
            Some(scenario) => {
                if let Some(err) = &scenario.error {
                    anyhow::bail!("{}", err);
                }
                Ok(scenario.result_for(req.query_index).cloned().unwrap_or_default())
            }
            None => match &self.fallback {
                Some(fallback) => fallback.execute(req).await,
                None => anyhow::bail!("no scenario for ticket '{}'", req.ticket_id),
            },
        }
    }

    fn name(&self) -> &'static str {
        "scenario"
    }
}
