// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container task-launch primitive.
//!
//! `KubeTaskLauncher` submits a batch Job per orchestrator job and polls it
//! to termination. The worker container reads its assignment from the
//! injected environment and writes its result to the blob store from the
//! inside; the launcher only reports process-level success or failure.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job as KubeJob;
use kube::api::{Api, DeleteParams, PostParams};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::AdapterError;
use crate::Result;

/// A fully validated launch specification. Every string placed here has
/// been through `hive_core::validate`; the launcher trusts but re-checks
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Task name; becomes the Job object name.
    pub name: String,
    /// Validated task-definition identifier (container image short name).
    pub task_definition: String,
    /// Optional command override.
    pub command: Option<Vec<String>>,
    /// Validated environment pairs (JOB_ID, TENANT_ID, …).
    pub env: Vec<(String, String)>,
    pub namespace: String,
}

/// Opaque reference to a launched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub name: String,
    pub namespace: String,
}

/// Terminal outcome of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed { message: String },
}

#[async_trait]
pub trait TaskLauncher: Send + Sync {
    async fn launch(&self, spec: TaskSpec) -> Result<TaskHandle>;

    /// Poll until the task terminates, the deadline passes, or `cancel`
    /// fires. Cancellation deletes the task before returning.
    async fn wait(
        &self,
        handle: &TaskHandle,
        poll_interval: Duration,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome>;
}

// ── Kubernetes implementation ───────────────────────────────────────────

pub struct KubeTaskLauncher {
    client: kube::Client,
}

impl KubeTaskLauncher {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig / in-cluster config.
    pub async fn connect() -> Result<Self> {
        let client = kube::Client::try_default()
            .await
            .map_err(|e| AdapterError::TaskLaunch(format!("kube client init failed: {e}")))?;
        Ok(Self { client })
    }

    fn jobs(&self, namespace: &str) -> Api<KubeJob> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn manifest(spec: &TaskSpec) -> Result<KubeJob> {
        let env: Vec<serde_json::Value> = spec
            .env
            .iter()
            .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
            .collect();
        let mut container = serde_json::json!({
            "name": "worker",
            "image": spec.task_definition,
            "env": env,
        });
        if let Some(command) = &spec.command {
            container["command"] = serde_json::json!(command);
        }
        let manifest = serde_json::json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {
                "name": spec.name,
                "labels": { "app.kubernetes.io/managed-by": "hive" },
            },
            "spec": {
                "backoffLimit": 0,
                "ttlSecondsAfterFinished": 3600,
                "template": {
                    "spec": {
                        "restartPolicy": "Never",
                        "containers": [container],
                    }
                }
            }
        });
        serde_json::from_value(manifest)
            .map_err(|e| AdapterError::TaskLaunch(format!("bad task manifest: {e}")))
    }

    async fn status(&self, handle: &TaskHandle) -> Result<Option<TaskOutcome>> {
        let job = self
            .jobs(&handle.namespace)
            .get(&handle.name)
            .await
            .map_err(|e| AdapterError::TaskLaunch(format!("task status fetch failed: {e}")))?;
        let status = job.status.unwrap_or_default();
        if status.succeeded.unwrap_or(0) > 0 {
            return Ok(Some(TaskOutcome::Succeeded));
        }
        if status.failed.unwrap_or(0) > 0 {
            let message = status
                .conditions
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| c.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Ok(Some(TaskOutcome::Failed {
                message: if message.is_empty() { "task failed".to_string() } else { message },
            }));
        }
        Ok(None)
    }

    async fn remove(&self, handle: &TaskHandle) {
        let _ = self
            .jobs(&handle.namespace)
            .delete(&handle.name, &DeleteParams::background())
            .await;
    }
}

#[async_trait]
impl TaskLauncher for KubeTaskLauncher {
    async fn launch(&self, spec: TaskSpec) -> Result<TaskHandle> {
        let manifest = Self::manifest(&spec)?;
        self.jobs(&spec.namespace)
            .create(&PostParams::default(), &manifest)
            .await
            .map_err(|e| AdapterError::TaskLaunch(format!("task create failed: {e}")))?;
        tracing::info!(task = %spec.name, namespace = %spec.namespace, "task launched");
        Ok(TaskHandle { name: spec.name, namespace: spec.namespace })
    }

    async fn wait(
        &self,
        handle: &TaskHandle,
        poll_interval: Duration,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome> {
        let give_up = tokio::time::Instant::now() + deadline;
        loop {
            if cancel.is_cancelled() {
                self.remove(handle).await;
                return Err(AdapterError::Cancelled);
            }
            if let Some(outcome) = self.status(handle).await? {
                return Ok(outcome);
            }
            if tokio::time::Instant::now() >= give_up {
                self.remove(handle).await;
                return Ok(TaskOutcome::Failed { message: "task deadline exceeded".to_string() });
            }
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }
}

// ── Fake implementation (tests) ─────────────────────────────────────────

/// Records launch specs and returns scripted outcomes.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeTaskLauncher {
    pub launched: parking_lot::Mutex<Vec<TaskSpec>>,
    outcomes: parking_lot::Mutex<std::collections::VecDeque<TaskOutcome>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeTaskLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcome(&self, outcome: TaskOutcome) {
        self.outcomes.lock().push_back(outcome);
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl TaskLauncher for FakeTaskLauncher {
    async fn launch(&self, spec: TaskSpec) -> Result<TaskHandle> {
        let handle = TaskHandle { name: spec.name.clone(), namespace: spec.namespace.clone() };
        self.launched.lock().push(spec);
        Ok(handle)
    }

    async fn wait(
        &self,
        _handle: &TaskHandle,
        _poll_interval: Duration,
        _deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome> {
        if cancel.is_cancelled() {
            return Err(AdapterError::Cancelled);
        }
        Ok(self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or(TaskOutcome::Succeeded))
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
