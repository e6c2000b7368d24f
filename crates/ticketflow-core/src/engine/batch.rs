use crate::corrector::Corrector;
use crate::criteria::{evaluate, CriteriaExpression};
use crate::model::{BatchItem, BatchStatus, ResultsByQuery, TicketEvaluation};
use crate::providers::{QueryExecutor, QueryRequest};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{timeout, Duration, Instant};

pub const NO_SQL_ERROR: &str = "no SQL found in ticket";
pub const INTERRUPTED_ERROR: &str = "processing was interrupted before a result was recorded";

#[derive(Debug, Clone)]
pub struct BatchPolicy {
    /// Per-statement execution timeout.
    pub timeout: Duration,
    /// Run every ticket's SQL through the corrector before executing it.
    pub auto_fix: bool,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            auto_fix: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem], cancelled: bool) -> Self {
        let count = |s: BatchStatus| items.iter().filter(|i| i.status == s).count();
        let completed = count(BatchStatus::Completed);
        let failed = count(BatchStatus::Failed);
        Self {
            total: items.len(),
            completed,
            failed,
            pending: items.len() - completed - failed,
            cancelled,
        }
    }
}

/// Published for every item transition. `item` is a full snapshot that
/// replaces the subscriber's copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    RunStarted {
        total: usize,
    },
    ItemUpdated {
        index: usize,
        item: Box<BatchItem>,
        progress: Progress,
    },
    RunFinished {
        summary: BatchSummary,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// Requests that a run stop before its next item.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Processes batch items one at a time: execute every statement, evaluate
/// the criteria, record the outcome on the item.
pub struct BatchOrchestrator {
    executor: Arc<dyn QueryExecutor>,
    policy: BatchPolicy,
    corrector: Option<Corrector>,
    events: Option<UnboundedSender<BatchEvent>>,
    running: AtomicBool,
}

impl BatchOrchestrator {
    pub fn new(executor: Arc<dyn QueryExecutor>, policy: BatchPolicy) -> Self {
        Self {
            executor,
            policy,
            corrector: None,
            events: None,
            running: AtomicBool::new(false),
        }
    }

    /// Corrector used when `policy.auto_fix` is on.
    pub fn with_corrector(mut self, corrector: Corrector) -> Self {
        self.corrector = Some(corrector);
        self
    }

    /// Returns a receiver for every event of subsequent runs. A new
    /// subscription replaces the previous one.
    pub fn subscribe(&mut self) -> UnboundedReceiver<BatchEvent> {
        let (tx, rx) = unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::SeqCst) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    pub fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// Runs every non-terminal item in order. Items already Completed or
    /// Failed are left alone; after cancellation the rest stay Pending.
    pub async fn run(&self, items: &mut [BatchItem], cancel: &CancelHandle) -> anyhow::Result<BatchSummary> {
        if self.running.swap(true, Ordering::SeqCst) {
            anyhow::bail!("a batch run is already in progress");
        }
        let _guard = RunningGuard(&self.running);

        let total = items.len();
        let mut done = items.iter().filter(|i| i.status.is_terminal()).count();
        let mut cancelled = false;
        self.emit(BatchEvent::RunStarted { total });
        tracing::info!(
            event = "ticketflow.batch.start",
            total,
            executor = self.executor.name(),
            auto_fix = self.policy.auto_fix,
        );

        for (index, item) in items.iter_mut().enumerate() {
            if item.status.is_terminal() {
                continue;
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            // Left Processing by a run that was dropped mid-item.
            if item.status == BatchStatus::Processing {
                *item = failed(item.clone(), INTERRUPTED_ERROR.to_string());
                done += 1;
                tracing::warn!(
                    event = "ticketflow.batch.interrupted",
                    ticket_id = %item.ticket.id,
                );
                self.emit_item(index, item, Progress { done, total });
                continue;
            }

            let mut processing = item.transitioned(BatchStatus::Processing)?;
            if self.policy.auto_fix {
                if let Some(corrector) = &self.corrector {
                    corrector.fix_ticket(&mut processing.ticket, None);
                }
            }
            *item = processing.clone();
            self.emit_item(index, item, Progress { done, total });

            let started = Instant::now();
            let finished = self.process(processing).await;
            *item = finished;
            done += 1;

            tracing::info!(
                event = "ticketflow.batch.item",
                ticket_id = %item.ticket.id,
                status = %item.status,
                rows = item.row_count(),
                duration_ms = started.elapsed().as_millis() as u64,
                error = item.error.as_deref().unwrap_or(""),
            );
            self.emit_item(index, item, Progress { done, total });
        }

        let summary = BatchSummary::from_items(items, cancelled);
        tracing::info!(
            event = "ticketflow.batch.finish",
            completed = summary.completed,
            failed = summary.failed,
            pending = summary.pending,
            cancelled,
        );
        self.emit(BatchEvent::RunFinished { summary });
        Ok(summary)
    }

    async fn process(&self, item: BatchItem) -> BatchItem {
        if !item.ticket.has_sql() {
            return failed(item, NO_SQL_ERROR.to_string());
        }

        let multi = item.ticket.is_multi_query();
        let mut results = ResultsByQuery::new();
        let mut failure = None;
        for (pos, sql) in item.ticket.sql_statements.iter().enumerate() {
            let req = QueryRequest {
                ticket_id: &item.ticket.id,
                query_index: pos + 1,
                sql,
            };
            let outcome = timeout(self.policy.timeout, self.executor.execute(&req)).await;
            let message = match outcome {
                Ok(Ok(rows)) => {
                    results.insert(req.query_index, rows);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "query timed out after {}s",
                    self.policy.timeout.as_secs_f64()
                ),
            };
            failure = Some(if multi {
                format!("query {}: {}", req.query_index, message)
            } else {
                message
            });
            break;
        }
        if let Some(message) = failure {
            return failed(item, message);
        }

        let evaluation = if item.ticket.criteria.trim().is_empty() {
            None
        } else {
            Some(match CriteriaExpression::parse(&item.ticket.criteria) {
                Ok(expr) => evaluate(&expr, &results),
                Err(e) => TicketEvaluation::unparseable(e.to_string()),
            })
        };

        let mut next = item;
        next.status = BatchStatus::Completed;
        next.results = results;
        next.evaluation = evaluation;
        next
    }

    fn emit_item(&self, index: usize, item: &BatchItem, progress: Progress) {
        self.emit(BatchEvent::ItemUpdated {
            index,
            item: Box::new(item.clone()),
            progress,
        });
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}

/// Only reached from Processing, so the move is always forward.
fn failed(mut item: BatchItem, error: String) -> BatchItem {
    item.status = BatchStatus::Failed;
    item.error = Some(error);
    item
}

/// Lookup by ticket id. When ids collide, the later item wins.
pub fn latest_by_id(items: &[BatchItem]) -> HashMap<&str, &BatchItem> {
    items.iter().map(|i| (i.ticket.id.as_str(), i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResultSet, Row, Scalar, Ticket};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Fixed {
        fail_for: &'static str,
        rows: usize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryExecutor for Fixed {
        async fn execute(&self, req: &QueryRequest<'_>) -> anyhow::Result<ResultSet> {
            self.seen.lock().unwrap().push(req.sql.to_string());
            if req.ticket_id == self.fail_for {
                anyhow::bail!("Query execution failed");
            }
            Ok((0..self.rows)
                .map(|i| Row::from([("sales".to_string(), Scalar::from(i as f64))]))
                .collect())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct Slow;

    #[async_trait]
    impl QueryExecutor for Slow {
        async fn execute(&self, _req: &QueryRequest<'_>) -> anyhow::Result<ResultSet> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn fixed(fail_for: &'static str) -> Arc<Fixed> {
        Arc::new(Fixed {
            fail_for,
            rows: 5,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn item(id: &str, sql: &str, criteria: &str) -> BatchItem {
        let mut t = Ticket {
            id: id.into(),
            criteria: criteria.into(),
            ..Default::default()
        };
        t.set_sql(sql);
        BatchItem::pending(t)
    }

    #[tokio::test]
    async fn test_run_marks_every_item_terminal() {
        let orch = BatchOrchestrator::new(fixed("T-2"), BatchPolicy::default());
        let mut items = vec![
            item("T-1", "SELECT 1;", "ROWCOUNT > 1"),
            item("T-2", "SELECT 2;", "ROWCOUNT > 1"),
            item("T-3", "SELECT 3;", "ROWCOUNT > 10"),
        ];
        let summary = orch.run(&mut items, &CancelHandle::new()).await.unwrap();

        assert_eq!((summary.completed, summary.failed, summary.total), (2, 1, 3));
        assert_eq!(summary.pending, 0);
        assert_eq!(items[1].error.as_deref(), Some("Query execution failed"));
        assert!(items[0].evaluation.as_ref().unwrap().overall_passed);
        // Completed means the ticket ran; the criteria can still fail.
        assert_eq!(items[2].status, BatchStatus::Completed);
        assert!(!items[2].evaluation.as_ref().unwrap().overall_passed);
        assert_eq!(orch.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_missing_sql_fails_and_empty_criteria_skip_evaluation() {
        let orch = BatchOrchestrator::new(fixed(""), BatchPolicy::default());
        let mut items = vec![item("A", "", "ROWCOUNT > 1"), item("B", "SELECT 1;", "")];
        orch.run(&mut items, &CancelHandle::new()).await.unwrap();

        assert_eq!(items[0].status, BatchStatus::Failed);
        assert_eq!(items[0].error.as_deref(), Some(NO_SQL_ERROR));
        assert_eq!(items[1].status, BatchStatus::Completed);
        assert!(items[1].evaluation.is_none());
        assert_eq!(items[1].row_count(), 5);
    }

    #[tokio::test]
    async fn test_unparseable_criteria_still_complete() {
        let orch = BatchOrchestrator::new(fixed(""), BatchPolicy::default());
        let mut items = vec![item("A", "SELECT 1;", "looks fine")];
        orch.run(&mut items, &CancelHandle::new()).await.unwrap();
        let eval = items[0].evaluation.as_ref().unwrap();
        assert_eq!(items[0].status, BatchStatus::Completed);
        assert!(!eval.overall_passed);
        assert!(eval.evaluations[0].message.contains("could not be parsed"));
    }

    #[tokio::test]
    async fn test_terminal_items_are_skipped() {
        let exec = fixed("");
        let orch = BatchOrchestrator::new(exec.clone(), BatchPolicy::default());
        let mut items = vec![item("A", "SELECT 1;", "ROWCOUNT > 1")];
        orch.run(&mut items, &CancelHandle::new()).await.unwrap();
        let before = items[0].clone();

        let summary = orch.run(&mut items, &CancelHandle::new()).await.unwrap();
        assert_eq!(items[0], before);
        assert_eq!(summary.completed, 1);
        assert_eq!(exec.seen.lock().unwrap().len(), 1);

        let mut again: Vec<BatchItem> = items.iter().map(BatchItem::requeue).collect();
        orch.run(&mut again, &CancelHandle::new()).await.unwrap();
        assert_eq!(exec.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_leftover_processing_item_fails_and_run_continues() {
        let exec = fixed("");
        let orch = BatchOrchestrator::new(exec.clone(), BatchPolicy::default());
        let mut stuck = item("A", "SELECT 1;", "ROWCOUNT > 1");
        stuck.status = BatchStatus::Processing;
        let mut items = vec![stuck, item("B", "SELECT 2;", "ROWCOUNT > 1")];

        let summary = orch.run(&mut items, &CancelHandle::new()).await.unwrap();
        assert_eq!((summary.completed, summary.failed, summary.pending), (1, 1, 0));
        assert_eq!(items[0].status, BatchStatus::Failed);
        assert_eq!(items[0].error.as_deref(), Some(INTERRUPTED_ERROR));
        assert_eq!(items[1].status, BatchStatus::Completed);
        assert_eq!(*exec.seen.lock().unwrap(), vec!["SELECT 2;".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_after_dropped_run_future() {
        let orch = BatchOrchestrator::new(Arc::new(Slow), BatchPolicy::default());
        let mut items = vec![item("A", "SELECT 1;", ""), item("B", "SELECT 2;", "")];
        let dropped = tokio::time::timeout(
            Duration::from_secs(1),
            orch.run(&mut items, &CancelHandle::new()),
        )
        .await;
        assert!(dropped.is_err());
        assert_eq!(items[0].status, BatchStatus::Processing);
        assert_eq!(orch.state(), RunState::Idle);

        let summary = orch.run(&mut items, &CancelHandle::new()).await.unwrap();
        assert_eq!(items[0].status, BatchStatus::Failed);
        // B hits the 30s policy timeout under the paused clock.
        assert_eq!(items[1].status, BatchStatus::Failed);
        assert_eq!(summary.pending, 0);
    }

    #[tokio::test]
    async fn test_cancel_leaves_remaining_items_pending() {
        let orch = BatchOrchestrator::new(fixed(""), BatchPolicy::default());
        let cancel = CancelHandle::new();
        cancel.cancel();
        let mut items = vec![item("A", "SELECT 1;", ""), item("B", "SELECT 1;", "")];
        let summary = orch.run(&mut items, &cancel).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.pending, 2);
        assert!(items.iter().all(|i| i.status == BatchStatus::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_the_item() {
        let policy = BatchPolicy {
            timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let orch = BatchOrchestrator::new(Arc::new(Slow), policy);
        let mut items = vec![item("A", "SELECT 1;", "ROWCOUNT > 0")];
        orch.run(&mut items, &CancelHandle::new()).await.unwrap();
        assert_eq!(items[0].status, BatchStatus::Failed);
        assert_eq!(items[0].error.as_deref(), Some("query timed out after 2s"));
    }

    #[tokio::test]
    async fn test_multi_statement_results_are_keyed_by_position() {
        let orch = BatchOrchestrator::new(fixed(""), BatchPolicy::default());
        let sql = "-- Query 1: a\nSELECT 1;\n-- Query 2: b\nSELECT 2;";
        let mut items = vec![item("M", sql, "Query 1: ROWCOUNT = 5; Query 2: MAX(sales) = 4")];
        orch.run(&mut items, &CancelHandle::new()).await.unwrap();
        assert_eq!(items[0].results.len(), 2);
        let eval = items[0].evaluation.as_ref().unwrap();
        assert_eq!(eval.passed_count(), 2);
    }

    #[tokio::test]
    async fn test_auto_fix_corrects_before_execution() {
        let exec = fixed("");
        let policy = BatchPolicy {
            auto_fix: true,
            ..Default::default()
        };
        let orch = BatchOrchestrator::new(exec.clone(), policy)
            .with_corrector(Corrector::with_defaults().unwrap());
        let mut items = vec![item("A", "SELCT a FORM t", "")];
        orch.run(&mut items, &CancelHandle::new()).await.unwrap();

        assert!(items[0].ticket.is_fixed);
        assert_eq!(exec.seen.lock().unwrap()[0], "SELECT a\nFROM t\nLIMIT 1000;");
    }

    #[tokio::test]
    async fn test_events_publish_snapshots_with_monotonic_progress() {
        let mut orch = BatchOrchestrator::new(fixed("B"), BatchPolicy::default());
        let mut rx = orch.subscribe();
        let mut items = vec![item("A", "SELECT 1;", ""), item("B", "SELECT 1;", "")];
        orch.run(&mut items, &CancelHandle::new()).await.unwrap();
        drop(orch);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events.first(), Some(&BatchEvent::RunStarted { total: 2 }));
        assert!(matches!(events.last(), Some(BatchEvent::RunFinished { .. })));

        let updates: Vec<(usize, BatchStatus, usize)> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::ItemUpdated {
                    index,
                    item,
                    progress,
                } => Some((*index, item.status, progress.done)),
                _ => None,
            })
            .collect();
        assert_eq!(
            updates,
            vec![
                (0, BatchStatus::Processing, 0),
                (0, BatchStatus::Completed, 1),
                (1, BatchStatus::Processing, 1),
                (1, BatchStatus::Failed, 2),
            ]
        );
    }

    #[test]
    fn test_latest_by_id_is_last_write_wins() {
        let mut first = item("DUP", "SELECT 1;", "");
        first.error = Some("first".into());
        let mut second = item("DUP", "SELECT 2;", "");
        second.error = Some("second".into());
        let items = vec![first, second];
        let map = latest_by_id(&items);
        assert_eq!(map.len(), 1);
        assert_eq!(map["DUP"].error.as_deref(), Some("second"));
    }
}
