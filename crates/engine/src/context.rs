// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job execution context.
//!
//! Everything a handler may touch travels in here: the job record, the
//! tenant-scoped workspace, the artifact sink, cancellation, the deadline,
//! and the visibility heartbeat. Handlers never see the queue or the raw
//! stores.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use hive_adapters::{BlobStore, JobQueue, Receipt};
use hive_core::clock::Clock;
use hive_core::{Job, SystemClock, TenantId};
use hive_storage::JobStore;

use crate::Result;

/// Extends the queue lease and the job record's `updated_at`, both halves
/// of "this worker is still alive".
#[derive(Clone)]
pub struct HeartbeatHandle {
    queue: Arc<dyn JobQueue>,
    store: JobStore,
    receipt: Receipt,
    tenant: TenantId,
    job_id: hive_core::JobId,
    visibility: Duration,
    clock: SystemClock,
}

impl HeartbeatHandle {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: JobStore,
        receipt: Receipt,
        tenant: TenantId,
        job_id: hive_core::JobId,
        visibility: Duration,
    ) -> Self {
        Self { queue, store, receipt, tenant, job_id, visibility, clock: SystemClock }
    }

    pub async fn beat(&self) -> Result<()> {
        self.queue.extend(&self.receipt, self.visibility).await?;
        self.store.heartbeat(&self.tenant, &self.job_id, self.clock.utc()).await?;
        Ok(())
    }
}

/// Tenant-scoped artifact writes. The prefix is fixed at construction so a
/// handler physically cannot write outside its job's blob subtree.
#[derive(Clone)]
pub struct ArtifactSink {
    blob: Arc<dyn BlobStore>,
    prefix: String,
}

impl ArtifactSink {
    pub fn new(blob: Arc<dyn BlobStore>, prefix: String) -> Self {
        Self { blob, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }

    /// Store a named artifact, returning its blob key (the job's result
    /// pointer when `name` is `result.json`).
    pub async fn put(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let key = self.key(name);
        self.blob.put(&key, bytes).await?;
        Ok(key)
    }

    pub async fn put_json(&self, name: &str, value: &serde_json::Value) -> Result<String> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| crate::EngineError::Handler(format!("artifact encode failed: {e}")))?;
        self.put(name, &bytes).await
    }
}

/// The context handed to executor strategies and handlers.
#[derive(Clone)]
pub struct JobContext {
    pub job: Job,
    /// Per-job scratch directory under the tenant workspace prefix.
    pub workspace_dir: PathBuf,
    pub artifacts: ArtifactSink,
    pub cancel: CancellationToken,
    pub deadline: Duration,
    heartbeat: Option<HeartbeatHandle>,
}

impl JobContext {
    pub fn new(
        job: Job,
        workspace_dir: PathBuf,
        artifacts: ArtifactSink,
        cancel: CancellationToken,
        deadline: Duration,
        heartbeat: Option<HeartbeatHandle>,
    ) -> Self {
        Self { job, workspace_dir, artifacts, cancel, deadline, heartbeat }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.job.tenant_id
    }

    /// Extend the visibility lease. Long-running handlers call this between
    /// phases; without it a crashed worker's job is redelivered.
    pub async fn heartbeat(&self) -> Result<()> {
        match &self.heartbeat {
            Some(handle) => handle.beat().await,
            None => Ok(()),
        }
    }

    /// Ensure the workspace directory exists and return it.
    pub fn ensure_workspace(&self) -> Result<&std::path::Path> {
        std::fs::create_dir_all(&self.workspace_dir)
            .map_err(|e| crate::EngineError::io(self.workspace_dir.display().to_string(), e))?;
        Ok(&self.workspace_dir)
    }
}
