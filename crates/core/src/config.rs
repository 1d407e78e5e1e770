// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration, loaded once at startup from `hive.toml`.
//!
//! Everything here is constructed before the listener starts and passed
//! down as part of the application context. No module-level mutable state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root for workspaces/, memory/, artifacts/, state/, escalations/.
    pub data_dir: PathBuf,
    pub dispatch: DispatchConfig,
    pub conductor: ConductorConfig,
    pub watcher: WatcherConfig,
    pub board: BoardConfig,
    pub auth: AuthConfig,
    pub provider: ProviderConfig,
    pub task_launch: TaskLaunchConfig,
}

/// Which executor strategy a deployment runs jobs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Registered handler functions in this process.
    #[default]
    InProcess,
    /// Container tasks via the task-launch API.
    TaskLaunch,
    /// Agent CLI in a tenant-keyed terminal-multiplexer session.
    Mux,
}

crate::simple_display! {
    StrategyKind {
        InProcess => "in_process",
        TaskLaunch => "task_launch",
        Mux => "mux",
    }
}

/// Dispatch engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Executor strategy for this deployment.
    pub strategy: StrategyKind,
    /// Agent command line for the mux strategy. `@PROMPT_FILE@` and
    /// `@RESULT_FILE@` markers are replaced per spawn.
    pub agent_command: String,
    /// Worker loops per process.
    pub concurrency: usize,
    /// Queue lease duration in seconds.
    pub visibility_timeout_secs: u64,
    /// Queue receive long-poll bound in milliseconds.
    pub poll_interval_ms: u64,
    /// Hard deadline per job in seconds.
    pub job_deadline_secs: u64,
    /// Grace between cooperative cancel and hard kill, in seconds.
    pub grace_period_secs: u64,
    /// QUEUED records older than this are re-enqueued by the reconciler.
    pub reconcile_grace_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            agent_command: "hive-agent --prompt @PROMPT_FILE@ --result @RESULT_FILE@".to_string(),
            concurrency: 4,
            visibility_timeout_secs: 300,
            poll_interval_ms: 1_000,
            job_deadline_secs: 1_800,
            grace_period_secs: 5,
            reconcile_grace_secs: 120,
        }
    }
}

impl DispatchConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn job_deadline(&self) -> Duration {
        Duration::from_secs(self.job_deadline_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

/// Conductor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Concurrently firing nodes per run.
    pub run_concurrency: usize,
    /// Hard deadline per agent invocation, in seconds.
    pub agent_deadline_secs: u64,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self { run_concurrency: 4, agent_deadline_secs: 600 }
    }
}

impl ConductorConfig {
    pub fn agent_deadline(&self) -> Duration {
        Duration::from_secs(self.agent_deadline_secs)
    }
}

/// Tiered watcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub poll_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
    /// Tier-2 aborts when this many agents have failed.
    pub max_failed_agents: usize,
    /// Log lines carried into the escalation signal.
    pub log_tail_lines: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 35,
            heartbeat_timeout_secs: 120,
            max_failed_agents: 3,
            log_tail_lines: 10,
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.heartbeat_timeout_secs as i64)
    }
}

/// Blackboard coordination tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Break-glass TTL for a crashed lock holder, in seconds.
    pub lock_ttl_secs: u64,
    /// Default claim-chain TTL in seconds.
    pub claim_ttl_secs: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self { lock_ttl_secs: 60, claim_ttl_secs: 600 }
    }
}

/// Credential table. When disabled every request maps to the `default` tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// credential key → tenant id.
    pub keys: HashMap<String, String>,
}

/// LLM provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key. The value
    /// never appears in configuration or spawn specs.
    pub api_key_env: String,
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 4096,
        }
    }
}

/// Container task-launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskLaunchConfig {
    pub namespace: String,
    /// Validated task-definition identifier (container image short name).
    pub task_definition: String,
    pub poll_interval_secs: u64,
}

impl Default for TaskLaunchConfig {
    fn default() -> Self {
        Self {
            namespace: "hive-jobs".to_string(),
            task_definition: "hive-worker".to_string(),
            poll_interval_secs: 5,
        }
    }
}

impl Config {
    /// Load from a TOML file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io { path: path.to_path_buf(), source: e })?;
        let mut config: Config = toml::from_str(&text)
            .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })?;
        if config.data_dir.as_os_str().is_empty() {
            config.data_dir = default_data_dir();
        }
        Ok(config)
    }

    /// Defaults with an explicit data dir (tests, embedded use).
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    pub fn workspace_dir(&self, tenant: &str, job: &str) -> PathBuf {
        self.data_dir.join("workspaces").join(tenant).join(job)
    }

    pub fn memory_dir(&self, tenant: &str) -> PathBuf {
        self.data_dir.join("memory").join(tenant)
    }

    pub fn artifact_prefix(&self, tenant: &str, job: &str) -> String {
        format!("artifacts/{}/jobs/{}", tenant, job)
    }

    pub fn escalation_dir(&self) -> PathBuf {
        self.data_dir.join("escalations")
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HIVE_DATA_DIR")
        .map(PathBuf::from)
        .or_else(|| dirs::data_local_dir().map(|d| d.join("hive")))
        .unwrap_or_else(|| PathBuf::from(".hive"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
