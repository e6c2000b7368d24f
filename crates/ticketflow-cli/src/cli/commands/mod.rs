pub mod batch;
pub mod evaluate;
pub mod fix;
pub mod init;
pub mod parse;
pub mod validate;

use super::args::{Cli, Command};
use std::path::Path;
use std::sync::Arc;
use ticketflow_core::config::{load_config, WorkflowConfig, DEFAULT_CONFIG_FILE};
use ticketflow_core::providers::{InMemoryScenarios, QueryExecutor, ScenarioExecutor, SyntheticExecutor};
use tokio::io::AsyncReadExt;

pub mod exit_codes {
    pub const OK: i32 = 0;
    /// Criteria not met, or a batch item failed.
    pub const FAILURE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Parse(args) => parse::run(args).await,
        Command::Fix(args) => fix::run(args).await,
        Command::Validate(args) => validate::run(args).await,
        Command::Evaluate(args) => evaluate::run(args).await,
        Command::Batch(args) => batch::run(args).await,
        Command::Init(args) => init::run(args),
        Command::Version => {
            println!("ticketflow {}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

/// Reads a file, or stdin when the path is `-`.
pub(crate) async fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        return Ok(buf);
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read input '{}': {}", path.display(), e))
}

/// An explicit `--config` must exist; otherwise `ticketflow.yaml` is used
/// when present and defaults apply when it is not. Environment overrides
/// apply last.
pub(crate) fn load_workflow_config(explicit: Option<&Path>) -> anyhow::Result<WorkflowConfig> {
    let mut cfg = match explicit {
        Some(path) => load_config(path, false)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            load_config(Path::new(DEFAULT_CONFIG_FILE), false)?
        }
        None => WorkflowConfig::default(),
    };
    cfg.apply_env_overrides();
    cfg.check()?;
    tracing::debug!(event = "ticketflow.config", config = ?cfg);
    Ok(cfg)
}

/// Canned scenarios when the config names a fixture, synthetic rows otherwise.
pub(crate) fn build_executor(cfg: &WorkflowConfig) -> anyhow::Result<Arc<dyn QueryExecutor>> {
    let synthetic: Arc<dyn QueryExecutor> = Arc::new(SyntheticExecutor::default());
    match &cfg.scenarios {
        Some(path) => {
            let source = InMemoryScenarios::from_path(path)?;
            Ok(Arc::new(
                ScenarioExecutor::new(Arc::new(source)).with_fallback(synthetic),
            ))
        }
        None => Ok(synthetic),
    }
}
