pub mod batch;

pub use batch::{latest_by_id, BatchEvent, BatchOrchestrator, BatchPolicy, BatchSummary, CancelHandle, Progress, RunState};
