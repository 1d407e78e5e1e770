// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol DTOs. Deliberately stringly-typed at the edges: the wire
//! carries display forms, the core keeps the real enums.

use serde::{Deserialize, Serialize};

use hive_core::Job;

/// Listing row for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub job_type: String,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Full job view. Small results are inlined next to the pointer so simple
/// clients never need blob access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub id: String,
    pub tenant_id: String,
    pub job_type: String,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            job_type: job.job_type.clone(),
            state: job.state.to_string(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

impl From<&Job> for JobDetail {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            tenant_id: job.tenant_id.to_string(),
            job_type: job.job_type.clone(),
            state: job.state.to_string(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            result_pointer: job.result_pointer.clone(),
            result: None,
            error_kind: job.error_kind.map(|k| k.to_string()),
            error_message: job.error_message.clone(),
            worker_id: job.worker_id.as_ref().map(|w| w.to_string()),
        }
    }
}

/// One agent row in a board summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub task: String,
    pub state: String,
    pub heartbeat_at: String,
}

/// Per-run blackboard summary for the list-agents capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSummary {
    pub run_id: String,
    pub agents: Vec<AgentSummary>,
    pub finding_count: usize,
    pub active_chains: usize,
    pub open_questions: usize,
}

/// Dependency probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub queue: bool,
    pub store: bool,
    pub blob: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub ok: bool,
    pub version: String,
    pub dependencies: DependencyHealth,
    pub registered_types: Vec<String>,
    pub queue_depth: usize,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
