// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch engine.
//!
//! A pool of worker loops, each owning one job end-to-end: receive a
//! leased message, CAS-claim the record, run the executor strategy under a
//! deadline, write exactly one terminal state, delete the message. A
//! background reconciler re-enqueues QUEUED records whose message was lost
//! in the submit gap.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use hive_core::clock::Clock;
use hive_core::{Config, ErrorKind, Job, JobId, SystemClock, TenantId, WorkerId};
use hive_adapters::{BlobStore, JobQueue, LeasedMessage, QueueMessage};
use hive_storage::{ClaimOutcome, JobStore};

use crate::context::{ArtifactSink, HeartbeatHandle, JobContext};
use crate::error::EngineError;
use crate::registry::HandlerRegistry;
use crate::retry::with_backoff;
use crate::strategy::ExecutorStrategy;
use crate::Result;

/// How often the reconciler sweeps for stranded QUEUED records.
const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct DispatchEngine {
    queue: Arc<dyn JobQueue>,
    jobs: JobStore,
    blob: Arc<dyn BlobStore>,
    registry: HandlerRegistry,
    strategy: Arc<dyn ExecutorStrategy>,
    config: Arc<Config>,
    clock: SystemClock,
    shutdown: CancellationToken,
}

impl DispatchEngine {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        jobs: JobStore,
        blob: Arc<dyn BlobStore>,
        registry: HandlerRegistry,
        strategy: Arc<dyn ExecutorStrategy>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            queue,
            jobs,
            blob,
            registry,
            strategy,
            config,
            clock: SystemClock,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn job_store(&self) -> &JobStore {
        &self.jobs
    }

    /// Validate, write the QUEUED record, then enqueue. If the enqueue
    /// fails after the write, the record is swept later by the reconciler;
    /// the job id is returned either way.
    pub async fn submit(
        &self,
        tenant: TenantId,
        job_type: &str,
        payload: Value,
    ) -> Result<JobId> {
        self.registry.check_submission(job_type, &payload)?;

        let job = Job::new(tenant, job_type, payload, self.clock.utc());
        let id = job.id;
        with_backoff("job_create", || async { self.jobs.create(&job).await.map_err(Into::into) })
            .await?;

        let enqueue = with_backoff("enqueue", || async {
            self.queue.enqueue(QueueMessage { job_id: id }).await.map_err(Into::into)
        })
        .await;
        if let Err(e) = enqueue {
            tracing::warn!(job_id = %id, error = %e, "enqueue failed after record write; reconciler will retry");
        }

        tracing::info!(job_id = %id, job_type, "job submitted");
        Ok(id)
    }

    /// Cancel a QUEUED job. Returns the resulting state.
    pub async fn cancel(&self, tenant: &TenantId, id: &JobId) -> Result<ClaimOutcome> {
        Ok(self.jobs.cancel(tenant, id, self.clock.utc()).await?)
    }

    /// Run worker loops plus the reconciler until shutdown.
    pub async fn run(&self) {
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..self.config.dispatch.concurrency {
            let engine = self.clone();
            let worker = WorkerId::new(format!("worker-{}-{}", i, uuid::Uuid::new_v4()));
            tasks.spawn(async move { engine.worker_loop(worker).await });
        }
        let engine = self.clone();
        tasks.spawn(async move { engine.reconcile_loop().await });
        while tasks.join_next().await.is_some() {}
    }

    /// Receive and process at most one message. Embedded deployments and
    /// tests drive the engine one message at a time with this.
    pub async fn run_one(&self, worker: &WorkerId) -> Result<bool> {
        let poll = Duration::from_millis(self.config.dispatch.poll_interval_ms);
        let visibility = self.config.dispatch.visibility_timeout();
        match self.queue.receive(poll, visibility).await? {
            Some(leased) => {
                self.process(worker, leased).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn worker_loop(&self, worker: WorkerId) {
        tracing::info!(worker = %worker, "dispatch worker started");
        let poll = Duration::from_millis(self.config.dispatch.poll_interval_ms);
        let visibility = self.config.dispatch.visibility_timeout();
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let received = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = self.queue.receive(poll, visibility) => received,
            };
            match received {
                Ok(Some(leased)) => {
                    if let Err(e) = self.process(&worker, leased).await {
                        if e.kind().is_fatal() {
                            tracing::error!(worker = %worker, error = %e, "fatal backend failure; worker stopping");
                            self.shutdown.cancel();
                            break;
                        }
                        tracing::warn!(worker = %worker, error = %e, "job processing returned the lease");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(worker = %worker, error = %e, "queue receive failed");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
        tracing::info!(worker = %worker, "dispatch worker stopped");
    }

    /// Process one leased message. Errors returned from here mean "the
    /// lease was NOT settled": the message stays for redelivery. All
    /// terminal outcomes settle the message inside.
    async fn process(&self, worker: &WorkerId, leased: LeasedMessage) -> Result<()> {
        let job_id = leased.message.job_id;

        // The message carries no tenant; find the record by scanning the
        // known tenant scopes.
        let Some((tenant, _)) = self.find_job(&job_id).await? else {
            // Record gone (or never written): poison message, drop it.
            tracing::warn!(job_id = %job_id, "message without a job record; dropping");
            self.queue.delete(&leased.receipt).await?;
            return Ok(());
        };

        let claim = self.jobs.claim(&tenant, &job_id, worker, self.clock.utc()).await?;
        let job = match claim {
            ClaimOutcome::Claimed(job) => job,
            ClaimOutcome::Miss(state) => {
                // Someone else owns it, or it's already terminal/cancelled
                tracing::debug!(job_id = %job_id, %state, "claim miss; deleting message");
                self.queue.delete(&leased.receipt).await?;
                return Ok(());
            }
        };

        if !self.registry.contains(&job.job_type) {
            self.finish_failure(
                &tenant,
                &job_id,
                ErrorKind::Validation,
                &format!("unknown job type {:?}", job.job_type),
            )
            .await?;
            self.queue.delete(&leased.receipt).await?;
            return Ok(());
        }

        let heartbeat = HeartbeatHandle::new(
            self.queue.clone(),
            self.jobs.clone(),
            leased.receipt.clone(),
            tenant.clone(),
            job_id,
            self.config.dispatch.visibility_timeout(),
        );
        let cancel = self.shutdown.child_token();
        let artifacts = ArtifactSink::new(
            self.blob.clone(),
            self.config.artifact_prefix(tenant.as_str(), job_id.as_str()),
        );
        let ctx = JobContext::new(
            job.clone(),
            self.config.workspace_dir(tenant.as_str(), job_id.as_str()),
            artifacts,
            cancel.clone(),
            self.config.dispatch.job_deadline(),
            Some(heartbeat),
        );

        let payload = job.payload.clone();
        let started = self.clock.now();
        let outcome = tokio::select! {
            outcome = self.strategy.execute(&ctx, &payload) => outcome,
            _ = tokio::time::sleep(self.config.dispatch.job_deadline()) => {
                cancel.cancel();
                // Cooperative cancellation gets a grace period, then we move on
                tokio::time::sleep(self.config.dispatch.grace_period()).await;
                Err(EngineError::Timeout(self.config.dispatch.job_deadline()))
            }
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(result) => {
                let result_json = result.result_json.unwrap_or_else(|| {
                    serde_json::json!({
                        "result_text": result.result_text,
                        "files_modified": result.files_modified,
                        "findings": result.findings,
                    })
                });
                let pointer = ctx.artifacts.put_json("result.json", &result_json).await?;
                with_backoff("finish_success", || async {
                    self.jobs
                        .finish_success(&tenant, &job_id, &pointer, self.clock.utc())
                        .await
                        .map_err(Into::into)
                })
                .await?;
                self.queue.delete(&leased.receipt).await?;
                tracing::info!(job_id = %job_id, elapsed_ms = elapsed.as_millis() as u64, "job succeeded");
                Ok(())
            }
            Err(e) => {
                let kind = e.kind();
                if !kind.is_terminal() {
                    // Transient backend trouble: return the lease untouched
                    // and let redelivery try again elsewhere.
                    return Err(e);
                }
                if kind.is_fatal() {
                    return Err(e);
                }
                self.finish_failure(&tenant, &job_id, kind, &e.to_string()).await?;
                self.queue.delete(&leased.receipt).await?;
                tracing::warn!(job_id = %job_id, %kind, error = %e, "job failed");
                Ok(())
            }
        }
    }

    async fn finish_failure(
        &self,
        tenant: &TenantId,
        id: &JobId,
        kind: ErrorKind,
        message: &str,
    ) -> Result<()> {
        with_backoff("finish_failure", || async {
            self.jobs
                .finish_failure(tenant, id, kind, message, self.clock.utc())
                .await
                .map_err(Into::into)
        })
        .await?;
        Ok(())
    }

    /// Tenants this deployment knows about: the auth table plus `default`.
    fn known_tenants(&self) -> Vec<TenantId> {
        let mut tenants = vec![TenantId::default_tenant()];
        for name in self.config.auth.keys.values() {
            if let Ok(tenant) = TenantId::new(name.clone()) {
                if !tenants.contains(&tenant) {
                    tenants.push(tenant);
                }
            }
        }
        tenants
    }

    async fn find_job(&self, id: &JobId) -> Result<Option<(TenantId, Job)>> {
        for tenant in self.known_tenants() {
            if let Some(job) = self.jobs.get(&tenant, id).await? {
                return Ok(Some((tenant, job)));
            }
        }
        Ok(None)
    }

    /// Re-enqueue QUEUED records older than the grace period. Harmless on
    /// duplicates: the claim CAS dedupes at execution time.
    async fn reconcile_loop(&self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(RECONCILE_INTERVAL) => {}
            }
            if let Err(e) = self.reconcile_once().await {
                tracing::warn!(error = %e, "reconcile pass failed");
            }
        }
    }

    pub async fn reconcile_once(&self) -> Result<usize> {
        let grace = chrono::Duration::seconds(self.config.dispatch.reconcile_grace_secs as i64);
        let mut requeued = 0;
        for tenant in self.known_tenants() {
            let stale = self.jobs.stale_queued(&tenant, grace, self.clock.utc()).await?;
            for job_id in stale {
                self.queue.enqueue(QueueMessage { job_id }).await?;
                requeued += 1;
                tracing::info!(job_id = %job_id, tenant = %tenant, "reconciler re-enqueued stale job");
            }
        }
        Ok(requeued)
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
