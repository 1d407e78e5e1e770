// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and state machine.
//!
//! A job is written once at ingress and afterwards mutated only by the
//! worker holding its visibility lease. Transitions are CAS-serialized per
//! job id by the store; this module encodes which arrows are legal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::tenant::TenantId;

crate::define_id! {
    /// Unique identifier for a job instance.
    pub struct JobId("job-");
}

/// Identifier of the dispatch worker loop currently holding a job lease.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

crate::simple_display! {
    JobState {
        Queued => "QUEUED",
        Running => "RUNNING",
        Succeeded => "SUCCEEDED",
        Failed => "FAILED",
        Cancelled => "CANCELLED",
    }
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Cancelled)
    }

    /// Legal arrows: QUEUED → RUNNING → {SUCCEEDED, FAILED}, QUEUED → CANCELLED.
    pub fn can_transition(&self, to: JobState) -> bool {
        matches!(
            (self, to),
            (JobState::Queued, JobState::Running)
                | (JobState::Queued, JobState::Cancelled)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        )
    }
}

/// A durable job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tenant_id: TenantId,
    /// Registered handler name ("echo", "workflow", …).
    pub job_type: String,
    /// Opaque JSON, validated by the handler's declared schema at dispatch.
    pub payload: serde_json::Value,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Blob-store key, set only in terminal states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Set while RUNNING.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
}

impl Job {
    pub fn new(
        tenant_id: TenantId,
        job_type: impl Into<String>,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            tenant_id,
            job_type: job_type.into(),
            payload,
            state: JobState::Queued,
            created_at: now,
            updated_at: now,
            result_pointer: None,
            error_message: None,
            error_kind: None,
            worker_id: None,
        }
    }

    /// Apply a state transition, keeping `updated_at` monotonic.
    ///
    /// Returns false (leaving the record untouched) when the arrow is not
    /// legal. A repeated terminal write is reported as illegal here; the
    /// store treats terminal → same-terminal as a no-op instead of an error.
    pub fn transition(&mut self, to: JobState, now: DateTime<Utc>) -> bool {
        if !self.state.can_transition(to) {
            return false;
        }
        self.state = to;
        self.touch(now);
        if to != JobState::Running {
            self.worker_id = None;
        }
        true
    }

    /// Advance `updated_at`, never letting it move backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.updated_at);
    }

    /// Mark the job RUNNING under the given worker's lease.
    pub fn start(&mut self, worker: WorkerId, now: DateTime<Utc>) -> bool {
        if !self.transition(JobState::Running, now) {
            return false;
        }
        self.worker_id = Some(worker);
        true
    }

    /// Terminal success with a result pointer.
    pub fn succeed(&mut self, result_pointer: impl Into<String>, now: DateTime<Utc>) -> bool {
        if !self.transition(JobState::Succeeded, now) {
            return false;
        }
        self.result_pointer = Some(result_pointer.into());
        true
    }

    /// Terminal failure with classification.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>, now: DateTime<Utc>) -> bool {
        if !self.transition(JobState::Failed, now) {
            return false;
        }
        self.error_kind = Some(kind);
        self.error_message = Some(message.into());
        true
    }

    /// Whether a RUNNING job's lease has gone stale and the job is eligible
    /// for redelivery.
    pub fn lease_expired(&self, now: DateTime<Utc>, visibility_timeout: chrono::Duration) -> bool {
        self.state == JobState::Running && now - self.updated_at > visibility_timeout
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            job_type: String = "echo",
        }
        set {
            id: JobId = JobId::new(),
            tenant_id: TenantId = TenantId::default_tenant(),
            payload: serde_json::Value = serde_json::json!({}),
            state: JobState = JobState::Queued,
            created_at: DateTime<Utc> = DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime<Utc> = DateTime::<Utc>::MIN_UTC,
        }
        option {
            result_pointer: String = None,
            error_message: String = None,
            error_kind: ErrorKind = None,
            worker_id: WorkerId = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
