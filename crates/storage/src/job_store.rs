// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable job records with CAS-serialized state transitions.
//!
//! Records live in the keyed-record store under a per-tenant scope, so a
//! tenant can never address another tenant's jobs. Every transition is a
//! read-check-write with the record version: concurrent dispatchers racing
//! for the same QUEUED job see exactly one winner.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use hive_adapters::{AdapterError, KvStore, VERSION_ABSENT};
use hive_core::{ErrorKind, Job, JobId, JobState, TenantId, WorkerId};

use crate::error::StorageError;
use crate::Result;

/// How many version-conflict retries a transition absorbs before giving
/// up. Conflicts settle fast; a loop that keeps losing means the job
/// already moved past the expected state.
const CAS_ATTEMPTS: usize = 3;

/// Result of trying to claim a QUEUED job.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// We won the CAS; the job is now RUNNING under our worker id.
    Claimed(Job),
    /// Someone else got there first (or the job was cancelled).
    Miss(JobState),
}

/// Listing filters for the query surface.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub state: Option<JobState>,
    pub job_type: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Clone)]
pub struct JobStore {
    kv: Arc<dyn KvStore>,
}

impl JobStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn scope(tenant: &TenantId) -> String {
        format!("jobs/{tenant}")
    }

    fn decode(id: &str, value: serde_json::Value) -> Result<Job> {
        serde_json::from_value(value)
            .map_err(|e| StorageError::Decode { id: id.to_string(), source: e })
    }

    fn encode(job: &Job) -> Result<serde_json::Value> {
        serde_json::to_value(job)
            .map_err(|e| StorageError::Encode { id: job.id.to_string(), source: e })
    }

    /// Write the initial QUEUED record. Exclusive: a duplicate id is a
    /// conflict, never an overwrite.
    pub async fn create(&self, job: &Job) -> Result<()> {
        self.kv
            .put(&Self::scope(&job.tenant_id), job.id.as_str(), Self::encode(job)?, Some(VERSION_ABSENT))
            .await?;
        Ok(())
    }

    pub async fn get(&self, tenant: &TenantId, id: &JobId) -> Result<Option<Job>> {
        match self.kv.get(&Self::scope(tenant), id.as_str()).await? {
            Some(versioned) => Ok(Some(Self::decode(id.as_str(), versioned.value)?)),
            None => Ok(None),
        }
    }

    pub async fn require(&self, tenant: &TenantId, id: &JobId) -> Result<Job> {
        self.get(tenant, id).await?.ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    /// Page of jobs for a tenant, newest first.
    pub async fn list(&self, tenant: &TenantId, filter: &JobFilter) -> Result<Vec<Job>> {
        let scope = Self::scope(tenant);
        let mut jobs = Vec::new();
        for key in self.kv.list(&scope).await? {
            let Some(versioned) = self.kv.get(&scope, &key).await? else { continue };
            let job = Self::decode(&key, versioned.value)?;
            if filter.state.is_some_and(|s| s != job.state) {
                continue;
            }
            if filter.job_type.as_deref().is_some_and(|t| t != job.job_type) {
                continue;
            }
            jobs.push(job);
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let jobs: Vec<Job> = jobs
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(jobs)
    }

    /// Generic CAS transition: re-reads on version conflict, gives up when
    /// the precondition stops holding.
    async fn cas<F>(&self, tenant: &TenantId, id: &JobId, mut attempt: F) -> Result<CasResult>
    where
        F: FnMut(&mut Job) -> bool,
    {
        let scope = Self::scope(tenant);
        for _ in 0..CAS_ATTEMPTS {
            let Some(versioned) = self.kv.get(&scope, id.as_str()).await? else {
                return Err(StorageError::NotFound { id: id.to_string() });
            };
            let mut job = Self::decode(id.as_str(), versioned.value)?;
            if !attempt(&mut job) {
                return Ok(CasResult::Miss(job));
            }
            match self
                .kv
                .put(&scope, id.as_str(), Self::encode(&job)?, Some(versioned.version))
                .await
            {
                Ok(_) => return Ok(CasResult::Won(job)),
                Err(AdapterError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        // Exhausted: report the current state as a miss.
        let job = self.require(tenant, id).await?;
        Ok(CasResult::Miss(job))
    }

    /// Claim a QUEUED job for execution (QUEUED → RUNNING).
    pub async fn claim(
        &self,
        tenant: &TenantId,
        id: &JobId,
        worker: &WorkerId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome> {
        let worker = worker.clone();
        match self.cas(tenant, id, |job| job.start(worker.clone(), now)).await? {
            CasResult::Won(job) => Ok(ClaimOutcome::Claimed(job)),
            CasResult::Miss(job) => Ok(ClaimOutcome::Miss(job.state)),
        }
    }

    /// Extend the visibility lease by advancing `updated_at`.
    pub async fn heartbeat(&self, tenant: &TenantId, id: &JobId, now: DateTime<Utc>) -> Result<()> {
        self.cas(tenant, id, |job| {
            if job.state != JobState::Running {
                return false;
            }
            job.touch(now);
            true
        })
        .await?;
        Ok(())
    }

    /// Terminal success. A job already in a terminal state is left
    /// untouched: duplicate terminal writes are no-ops by design.
    pub async fn finish_success(
        &self,
        tenant: &TenantId,
        id: &JobId,
        result_pointer: &str,
        now: DateTime<Utc>,
    ) -> Result<Job> {
        let outcome = self
            .cas(tenant, id, |job| {
                if job.state.is_terminal() {
                    return false;
                }
                job.succeed(result_pointer, now)
            })
            .await?;
        Ok(outcome.into_job())
    }

    /// Terminal failure with classification. Also a no-op on an already
    /// terminal record.
    pub async fn finish_failure(
        &self,
        tenant: &TenantId,
        id: &JobId,
        kind: ErrorKind,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Job> {
        let outcome = self
            .cas(tenant, id, |job| {
                if job.state.is_terminal() {
                    return false;
                }
                job.fail(kind, message, now)
            })
            .await?;
        Ok(outcome.into_job())
    }

    /// Cancel a job that has not started (QUEUED → CANCELLED).
    pub async fn cancel(&self, tenant: &TenantId, id: &JobId, now: DateTime<Utc>) -> Result<ClaimOutcome> {
        match self.cas(tenant, id, |job| job.transition(JobState::Cancelled, now)).await? {
            CasResult::Won(job) => Ok(ClaimOutcome::Claimed(job)),
            CasResult::Miss(job) => Ok(ClaimOutcome::Miss(job.state)),
        }
    }

    /// QUEUED jobs whose record is older than `grace`, candidates for the
    /// reconciler to re-enqueue (the submit-then-enqueue gap).
    pub async fn stale_queued(
        &self,
        tenant: &TenantId,
        grace: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobId>> {
        let filter = JobFilter { state: Some(JobState::Queued), ..Default::default() };
        Ok(self
            .list(tenant, &filter)
            .await?
            .into_iter()
            .filter(|job| now - job.updated_at > grace)
            .map(|job| job.id)
            .collect())
    }
}

enum CasResult {
    Won(Job),
    Miss(Job),
}

impl CasResult {
    fn into_job(self) -> Job {
        match self {
            CasResult::Won(job) | CasResult::Miss(job) => job,
        }
    }
}

#[cfg(test)]
#[path = "job_store_tests.rs"]
mod tests;
