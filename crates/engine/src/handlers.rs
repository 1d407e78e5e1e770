// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in job handlers: `echo`, `claude_chat`, and `workflow`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use hive_core::clock::Clock;
use hive_core::SystemClock;
use hive_adapters::{GenerateRequest, Provider};
use hive_workflow::WorkflowDef;

use crate::conductor::{Conductor, ConductorDeps};
use crate::context::JobContext;
use crate::error::EngineError;
use crate::registry::{FieldKind, FieldSpec, Handler, HandlerSpec};
use crate::Result;

// ── echo ────────────────────────────────────────────────────────────────

/// The canary handler: returns its input. Useful for end-to-end checks of
/// the whole submit → dispatch → artifact path.
pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    fn spec(&self) -> HandlerSpec {
        HandlerSpec {
            name: "echo",
            fields: vec![FieldSpec::required("message", FieldKind::String)],
        }
    }

    async fn run(&self, _ctx: &JobContext, payload: &Value) -> Result<Value> {
        let clock = SystemClock;
        let message = payload.get("message").and_then(Value::as_str).unwrap_or_default();
        Ok(json!({
            "echoed": message,
            "processed_at": clock.utc().to_rfc3339(),
        }))
    }
}

// ── claude_chat ─────────────────────────────────────────────────────────

/// One-shot provider invocation.
pub struct ChatHandler {
    provider: Arc<dyn Provider>,
}

impl ChatHandler {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Handler for ChatHandler {
    fn spec(&self) -> HandlerSpec {
        HandlerSpec {
            name: "claude_chat",
            fields: vec![
                FieldSpec::required("prompt", FieldKind::String),
                FieldSpec::optional("model", FieldKind::String),
                FieldSpec::optional("max_tokens", FieldKind::Number),
                FieldSpec::optional("system", FieldKind::String),
            ],
        }
    }

    async fn run(&self, _ctx: &JobContext, payload: &Value) -> Result<Value> {
        let mut request = GenerateRequest::new(
            payload.get("prompt").and_then(Value::as_str).unwrap_or_default(),
        );
        if let Some(model) = payload.get("model").and_then(Value::as_str) {
            request = request.model(model);
        }
        if let Some(system) = payload.get("system").and_then(Value::as_str) {
            request = request.system(system);
        }
        if let Some(max_tokens) = payload.get("max_tokens").and_then(Value::as_u64) {
            request = request.max_tokens(max_tokens as u32);
        }
        let generation = self.provider.generate(request).await?;
        Ok(json!({
            "response_text": generation.text,
            "usage": {
                "input_tokens": generation.usage.input_tokens,
                "output_tokens": generation.usage.output_tokens,
            },
            "model": generation.model,
        }))
    }
}

// ── workflow ────────────────────────────────────────────────────────────

/// Runs a conductor over a workflow definition carried inline in the
/// payload or loaded from a definition file.
pub struct WorkflowHandler {
    deps: ConductorDeps,
}

impl WorkflowHandler {
    pub fn new(deps: ConductorDeps) -> Self {
        Self { deps }
    }

    fn load_def(payload: &Value) -> Result<WorkflowDef> {
        if let Some(inline) = payload.get("workflow") {
            return Ok(hive_workflow::from_value(inline.clone())?);
        }
        if let Some(path) = payload.get("workflow_path").and_then(Value::as_str) {
            return Ok(hive_workflow::load_file(std::path::Path::new(path))?);
        }
        Err(EngineError::PayloadSchema {
            field: "workflow".to_string(),
            problem: "or workflow_path is required".to_string(),
        })
    }
}

#[async_trait]
impl Handler for WorkflowHandler {
    fn spec(&self) -> HandlerSpec {
        HandlerSpec {
            name: "workflow",
            fields: vec![
                FieldSpec::optional("workflow", FieldKind::Object),
                FieldSpec::optional("workflow_path", FieldKind::String),
                FieldSpec::optional("input", FieldKind::Object),
            ],
        }
    }

    /// Submission-time validation goes all the way down: a workflow whose
    /// definition fails structural or identifier validation never creates
    /// a job record.
    fn validate_payload(&self, payload: &Value) -> Result<()> {
        self.spec().check(payload)?;
        Self::load_def(payload)?;
        if let Some(domain) = payload
            .get("input")
            .and_then(|i| i.get("domain"))
            .and_then(Value::as_str)
        {
            domain.parse::<hive_storage::Domain>().map_err(EngineError::Storage)?;
        }
        Ok(())
    }

    async fn run(&self, ctx: &JobContext, payload: &Value) -> Result<Value> {
        let def = Self::load_def(payload)?;
        let input = payload.get("input").cloned().unwrap_or_else(|| json!({}));
        ctx.ensure_workspace()?;

        let conductor = Conductor::new(self.deps.clone(), ctx.tenant().clone())?;
        let run = conductor
            .run_workflow(&def, input, &ctx.workspace_dir, &ctx.cancel)
            .await?;

        match run.status {
            hive_core::RunStatus::Failed => {
                return Err(EngineError::Handler(format!(
                    "workflow run {} failed ({} of {} nodes failed)",
                    run.id, run.failed_nodes, run.total_nodes
                )));
            }
            hive_core::RunStatus::Cancelled => return Err(EngineError::Cancelled),
            _ => {}
        }

        let findings = run
            .output
            .as_ref()
            .and_then(|o| o.get("findings"))
            .cloned()
            .unwrap_or_else(|| json!([]));
        Ok(json!({
            "run_id": run.id,
            "status": run.status,
            "summary": format!(
                "{}: {}/{} nodes completed, {} failed",
                run.status, run.completed_nodes, run.total_nodes, run.failed_nodes
            ),
            "findings": findings,
        }))
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
