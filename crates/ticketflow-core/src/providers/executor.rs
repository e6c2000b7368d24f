use crate::model::ResultSet;
use async_trait::async_trait;

/// One statement of one ticket, as handed to the execution collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRequest<'a> {
    pub ticket_id: &'a str,
    /// 1-based position of the statement within the ticket.
    pub query_index: usize,
    pub sql: &'a str,
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, req: &QueryRequest<'_>) -> anyhow::Result<ResultSet>;
    fn name(&self) -> &'static str;
}
