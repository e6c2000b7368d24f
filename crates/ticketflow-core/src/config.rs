use crate::corrector::{CorrectorOptions, DEFAULT_ROW_LIMIT};
use crate::engine::BatchPolicy;
use crate::errors::ConfigError;
use crate::validate::ValidateOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "ticketflow.yaml";

pub const ENV_ROW_LIMIT: &str = "TICKETFLOW_ROW_LIMIT";
pub const ENV_TIMEOUT_SECONDS: &str = "TICKETFLOW_TIMEOUT_SECONDS";

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

fn default_row_limit() -> u64 {
    DEFAULT_ROW_LIMIT
}

fn default_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Appended as `LIMIT n` by the corrector and the largest limit validation accepts.
    #[serde(default = "default_row_limit")]
    pub row_limit: u64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub auto_fix: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            row_limit: default_row_limit(),
            timeout_seconds: default_timeout_seconds(),
            auto_fix: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub settings: Settings,
    /// Scenario fixture file; relative paths resolve against the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            settings: Settings::default(),
            scenarios: None,
        }
    }
}

impl WorkflowConfig {
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overrides settings from `lookup`; unparseable values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(ENV_ROW_LIMIT) {
            match v.trim().parse() {
                Ok(n) => self.settings.row_limit = n,
                Err(_) => tracing::warn!(event = "ticketflow.config.env_ignored", key = ENV_ROW_LIMIT, value = %v),
            }
        }
        if let Some(v) = lookup(ENV_TIMEOUT_SECONDS) {
            match v.trim().parse() {
                Ok(n) => self.settings.timeout_seconds = n,
                Err(_) => {
                    tracing::warn!(event = "ticketflow.config.env_ignored", key = ENV_TIMEOUT_SECONDS, value = %v)
                }
            }
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_CONFIG_VERSION {
            return Err(ConfigError(format!(
                "unsupported config version {} (supported: {})",
                self.version, SUPPORTED_CONFIG_VERSION
            )));
        }
        if self.settings.row_limit == 0 {
            return Err(ConfigError("settings.row_limit must be at least 1".into()));
        }
        if self.settings.timeout_seconds == 0 {
            return Err(ConfigError("settings.timeout_seconds must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_seconds)
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            timeout: self.timeout(),
            auto_fix: self.settings.auto_fix,
        }
    }

    pub fn corrector_options(&self) -> CorrectorOptions {
        CorrectorOptions {
            row_limit: self.settings.row_limit,
            ..Default::default()
        }
    }

    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions {
            max_row_limit: self.settings.row_limit,
        }
    }
}

/// Loads and checks a config file. Unknown keys are warned about, or
/// rejected when `strict` is set.
pub fn load_config(path: &Path, strict: bool) -> Result<WorkflowConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);
    let mut cfg: WorkflowConfig = serde_ignored::deserialize(deserializer, |p| {
        ignored_keys.insert(p.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    // `x-` prefixed keys are free for YAML anchors.
    let unknown: Vec<String> = ignored_keys
        .into_iter()
        .filter(|k| !k.starts_with("x-"))
        .collect();
    if !unknown.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "unknown fields in strict mode: {:?} (file: {})",
                unknown,
                path.display()
            )));
        }
        tracing::warn!(
            event = "ticketflow.config.unknown_keys",
            keys = ?unknown,
            file = %path.display(),
        );
    }

    cfg.check()?;

    if let Some(scenarios) = cfg.scenarios.take() {
        let base = path.parent().unwrap_or(Path::new("."));
        cfg.scenarios = Some(if scenarios.is_absolute() {
            scenarios
        } else {
            base.join(scenarios)
        });
    }

    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"version: 1
settings:
  # LIMIT appended by `ticketflow fix`; also the largest limit `validate` accepts.
  row_limit: 1000
  timeout_seconds: 30
  auto_fix: false
# Canned results keyed by ticket id; tickets without one get synthetic rows.
# scenarios: scenarios.yaml
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
