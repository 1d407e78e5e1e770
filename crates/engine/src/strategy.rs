// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor strategies.
//!
//! One strategy per deployment mode, all behind the same contract:
//! `execute` drives a whole job, `spawn_agent` runs one agent on behalf of
//! a workflow node. Every identifier that lands in an environment variable
//! or a spawn argument has been through `validate` before it gets here.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use hive_core::clock::Clock;
use hive_core::{parse_agent_output, validate, Finding, IdKind, SystemClock};
use hive_adapters::{
    BlobStore, GenerateRequest, Provider, TaskLauncher, TaskOutcome, TaskSpec, TmuxSessions,
};
use hive_core::config::TaskLaunchConfig;

use crate::context::JobContext;
use crate::error::EngineError;
use crate::registry::HandlerRegistry;
use crate::Result;

/// What a strategy returns for a whole job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecResult {
    pub result_json: Option<Value>,
    pub result_text: Option<String>,
    pub files_modified: Vec<String>,
    pub findings: Vec<Finding>,
}

impl ExecResult {
    pub fn from_json(value: Value) -> Self {
        Self { result_json: Some(value), ..Default::default() }
    }
}

/// One agent invocation on behalf of a node.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Validated agent identifier (`{node_id}-p{i}`, `{node_id}-{role}`).
    pub agent_id: String,
    /// Optional agent flavor ("code reviewer"). Validated as AgentType.
    pub agent_type: Option<String>,
    pub prompt: String,
    pub workspace_dir: PathBuf,
    /// Extra validated environment (NODE_ID, BOARD_PATH, …).
    pub env: Vec<(String, String)>,
    pub deadline: Duration,
    pub cancel: CancellationToken,
}

/// Raw agent output plus bookkeeping.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub output: String,
    pub session_id: Option<String>,
    pub token_count: u64,
}

#[async_trait]
pub trait ExecutorStrategy: Send + Sync {
    /// Drive one job end-to-end.
    async fn execute(&self, ctx: &JobContext, payload: &Value) -> Result<ExecResult>;

    /// Run one agent and return its output.
    async fn spawn_agent(&self, spec: AgentSpec) -> Result<AgentRun>;
}

// ── In-process strategy ─────────────────────────────────────────────────

/// Looks up a registered handler and calls it in-process. Agents are
/// provider API calls.
pub struct InProcessStrategy {
    registry: HandlerRegistry,
    provider: Arc<dyn Provider>,
}

impl InProcessStrategy {
    pub fn new(registry: HandlerRegistry, provider: Arc<dyn Provider>) -> Self {
        Self { registry, provider }
    }
}

#[async_trait]
impl ExecutorStrategy for InProcessStrategy {
    async fn execute(&self, ctx: &JobContext, payload: &Value) -> Result<ExecResult> {
        let handler = self.registry.get(&ctx.job.job_type).ok_or_else(|| {
            EngineError::UnknownJobType { job_type: ctx.job.job_type.clone() }
        })?;
        let result = handler.run(ctx, payload).await?;
        Ok(ExecResult::from_json(result))
    }

    async fn spawn_agent(&self, spec: AgentSpec) -> Result<AgentRun> {
        validate(&spec.agent_id, IdKind::Agent)?;
        let request = match &spec.agent_type {
            Some(agent_type) => GenerateRequest::new(spec.prompt.clone())
                .system(format!("You are a {agent_type} agent.")),
            None => GenerateRequest::new(spec.prompt.clone()),
        };
        let generate = self.provider.generate(request);
        tokio::select! {
            _ = spec.cancel.cancelled() => Err(EngineError::Cancelled),
            outcome = tokio::time::timeout(spec.deadline, generate) => match outcome {
                Err(_) => Err(EngineError::Timeout(spec.deadline)),
                Ok(Err(e)) => Err(e.into()),
                Ok(Ok(generation)) => Ok(AgentRun {
                    output: generation.text,
                    session_id: None,
                    token_count: generation.usage.input_tokens + generation.usage.output_tokens,
                }),
            },
        }
    }
}

// ── Task-launch strategy ────────────────────────────────────────────────

/// Launches a container task per job/agent. The task writes its result to
/// the blob store from inside; this side only observes process outcome and
/// reads the blob back.
pub struct TaskLaunchStrategy {
    launcher: Arc<dyn TaskLauncher>,
    blob: Arc<dyn BlobStore>,
    config: TaskLaunchConfig,
}

impl TaskLaunchStrategy {
    pub fn new(
        launcher: Arc<dyn TaskLauncher>,
        blob: Arc<dyn BlobStore>,
        config: TaskLaunchConfig,
    ) -> Self {
        Self { launcher, blob, config }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_secs)
    }

    async fn read_result_blob(&self, key: &str) -> Result<Option<Value>> {
        let Some(bytes) = self.blob.get(key).await? else { return Ok(None) };
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::Handler(format!("bad result blob {key}: {e}")))?;
        Ok(Some(value))
    }
}

#[async_trait]
impl ExecutorStrategy for TaskLaunchStrategy {
    async fn execute(&self, ctx: &JobContext, _payload: &Value) -> Result<ExecResult> {
        let job = &ctx.job;
        let task_definition = validate(&self.config.task_definition, IdKind::Node)?.to_string();
        let name = format!("hive-{}", job.id.suffix().to_ascii_lowercase());
        validate(&name, IdKind::Node)?;

        let spec = TaskSpec {
            name,
            task_definition,
            command: None,
            env: vec![
                ("JOB_ID".to_string(), job.id.to_string()),
                ("TENANT_ID".to_string(), job.tenant_id.to_string()),
                ("WORKSPACE_DIR".to_string(), ctx.workspace_dir.display().to_string()),
                ("ARTIFACT_PREFIX".to_string(), ctx.artifacts.prefix().to_string()),
            ],
            namespace: self.config.namespace.clone(),
        };
        let handle = self.launcher.launch(spec).await?;
        let outcome = self
            .launcher
            .wait(&handle, self.poll_interval(), ctx.deadline, &ctx.cancel)
            .await?;

        match outcome {
            TaskOutcome::Succeeded => {
                let result = self.read_result_blob(&ctx.artifacts.key("result.json")).await?;
                Ok(ExecResult { result_json: result, ..Default::default() })
            }
            TaskOutcome::Failed { message } => Err(EngineError::Handler(message)),
        }
    }

    async fn spawn_agent(&self, spec: AgentSpec) -> Result<AgentRun> {
        validate(&spec.agent_id, IdKind::Agent)?;
        let task_definition = validate(&self.config.task_definition, IdKind::Node)?.to_string();
        let name = format!("hive-agent-{}", spec.agent_id.to_ascii_lowercase());

        // Prompt travels via blob store; the container reads PROMPT_KEY and
        // writes OUTPUT_KEY on exit.
        let prompt_key = format!("agents/{}/prompt.txt", spec.agent_id);
        let output_key = format!("agents/{}/output.txt", spec.agent_id);
        self.blob.put(&prompt_key, spec.prompt.as_bytes()).await?;

        let mut env = spec.env.clone();
        env.push(("PROMPT_KEY".to_string(), prompt_key));
        env.push(("OUTPUT_KEY".to_string(), output_key.clone()));
        if let Some(agent_type) = &spec.agent_type {
            env.push(("AGENT_TYPE".to_string(), agent_type.clone()));
        }

        let handle = self
            .launcher
            .launch(TaskSpec {
                name: name.clone(),
                task_definition,
                command: None,
                env,
                namespace: self.config.namespace.clone(),
            })
            .await?;
        let outcome = self
            .launcher
            .wait(&handle, self.poll_interval(), spec.deadline, &spec.cancel)
            .await?;

        match outcome {
            TaskOutcome::Succeeded => {
                let output = self
                    .blob
                    .get(&output_key)
                    .await?
                    .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
                    .unwrap_or_default();
                Ok(AgentRun { output, session_id: Some(name), token_count: 0 })
            }
            TaskOutcome::Failed { message } => Err(EngineError::Handler(message)),
        }
    }
}

// ── Local-process-in-multiplexer strategy ───────────────────────────────

/// Runs an interactive-agent CLI in a tenant-keyed tmux session. The
/// machine-readable prompt file goes in before spawn; the agent writes a
/// result file and exits (0 success, 1 reported failure, 2 config error).
pub struct MuxStrategy {
    sessions: TmuxSessions,
    /// Agent command line; `@PROMPT_FILE@` and `@RESULT_FILE@` markers are
    /// replaced with the per-run file paths.
    agent_command: String,
    poll: Duration,
}

/// The structured result file an agent writes before exiting.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct MuxResultFile {
    exit_code: i32,
    #[serde(default)]
    output: String,
    #[serde(default)]
    token_count: u64,
}

impl MuxStrategy {
    pub fn new(sessions: TmuxSessions, agent_command: impl Into<String>) -> Self {
        Self { sessions, agent_command: agent_command.into(), poll: Duration::from_millis(500) }
    }

    fn session_name(tenant: &str) -> String {
        format!("hive-{tenant}")
    }

    async fn run_in_window(
        &self,
        tenant: &str,
        window: &str,
        workspace_dir: &std::path::Path,
        prompt: &str,
        env: Vec<(String, String)>,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<MuxResultFile> {
        std::fs::create_dir_all(workspace_dir)
            .map_err(|e| EngineError::io(workspace_dir.display().to_string(), e))?;
        let prompt_file = workspace_dir.join(format!("{window}.prompt.md"));
        let result_file = workspace_dir.join(format!("{window}.result.json"));
        std::fs::write(&prompt_file, prompt)
            .map_err(|e| EngineError::io(prompt_file.display().to_string(), e))?;
        let _ = std::fs::remove_file(&result_file);

        let session = Self::session_name(tenant);
        self.sessions.ensure_session(&session).await?;

        let command = self
            .agent_command
            .replace("@PROMPT_FILE@", &prompt_file.display().to_string())
            .replace("@RESULT_FILE@", &result_file.display().to_string());
        self.sessions.spawn_window(&session, window, workspace_dir, &env, &command).await?;

        let give_up = tokio::time::Instant::now() + deadline;
        loop {
            if cancel.is_cancelled() {
                self.sessions.kill_window(&session, window).await?;
                return Err(EngineError::Cancelled);
            }
            if result_file.is_file() {
                let bytes = std::fs::read(&result_file)
                    .map_err(|e| EngineError::io(result_file.display().to_string(), e))?;
                let result: MuxResultFile = serde_json::from_slice(&bytes)
                    .map_err(|e| EngineError::Handler(format!("bad agent result file: {e}")))?;
                return Ok(result);
            }
            // Window gone without a result file: the agent crashed
            if !self.sessions.window_alive(&session, window).await? {
                return Err(EngineError::Handler(format!("agent window {window} exited without a result")));
            }
            if tokio::time::Instant::now() >= give_up {
                self.sessions.kill_window(&session, window).await?;
                return Err(EngineError::Timeout(deadline));
            }
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.poll) => {}
            }
        }
    }

    fn interpret(result: MuxResultFile, agent_id: &str) -> Result<AgentRun> {
        match result.exit_code {
            0 => Ok(AgentRun { output: result.output, session_id: None, token_count: result.token_count }),
            1 => Err(EngineError::Handler(result.output)),
            2 => Err(EngineError::AgentConfig { agent_id: agent_id.to_string() }),
            other => Err(EngineError::Handler(format!("agent crashed with exit code {other}"))),
        }
    }
}

#[async_trait]
impl ExecutorStrategy for MuxStrategy {
    async fn execute(&self, ctx: &JobContext, payload: &Value) -> Result<ExecResult> {
        let job = &ctx.job;
        let window = validate(&format!("job-{}", job.id.suffix()), IdKind::Node)?.to_string();
        let prompt = payload
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or(&job.job_type)
            .to_string();
        let env = vec![
            ("JOB_ID".to_string(), job.id.to_string()),
            ("TENANT_ID".to_string(), job.tenant_id.to_string()),
            ("WORKSPACE_DIR".to_string(), ctx.workspace_dir.display().to_string()),
            ("ARTIFACT_PREFIX".to_string(), ctx.artifacts.prefix().to_string()),
        ];
        let result = self
            .run_in_window(
                job.tenant_id.as_str(),
                &window,
                &ctx.workspace_dir,
                &prompt,
                env,
                ctx.deadline,
                &ctx.cancel,
            )
            .await?;
        let run = Self::interpret(result, &window)?;
        let clock = SystemClock;
        let parsed = parse_agent_output(&window, &run.output, clock.utc());
        Ok(ExecResult {
            result_json: None,
            result_text: Some(run.output),
            files_modified: Vec::new(),
            findings: parsed.findings,
        })
    }

    async fn spawn_agent(&self, spec: AgentSpec) -> Result<AgentRun> {
        validate(&spec.agent_id, IdKind::Agent)?;
        let tenant = spec
            .env
            .iter()
            .find(|(name, _)| name == "TENANT_ID")
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| hive_core::DEFAULT_TENANT.to_string());
        let result = self
            .run_in_window(
                &tenant,
                &spec.agent_id,
                &spec.workspace_dir,
                &spec.prompt,
                spec.env.clone(),
                spec.deadline,
                &spec.cancel,
            )
            .await?;
        let mut run = Self::interpret(result, &spec.agent_id)?;
        run.session_id = Some(format!("{}:{}", Self::session_name(&tenant), spec.agent_id));
        Ok(run)
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
