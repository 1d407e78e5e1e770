// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow run record.
//!
//! One run per execution of a workflow. Created by a top-level `workflow`
//! job, never mutated after `completed_at` is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

crate::define_id! {
    /// Unique identifier for a workflow run.
    pub struct RunId("run-");
}

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }
}

/// One execution of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    /// Absent for ad-hoc swarms started without a stored definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    pub tenant_id: TenantId,
    pub status: RunStatus,
    /// Free-text checkpoint, e.g. "exploring" or "synthesis".
    #[serde(default)]
    pub phase: String,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Mutated by nodes as the run progresses; the merge rules live in the
    /// conductor (findings append, scalars last-writer-wins, file sets union).
    pub context: serde_json::Value,
    pub total_nodes: u32,
    pub completed_nodes: u32,
    pub failed_nodes: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn new(
        tenant_id: TenantId,
        workflow_id: Option<String>,
        input: serde_json::Value,
        total_nodes: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RunId::new(),
            workflow_id,
            tenant_id,
            status: RunStatus::Pending,
            phase: String::new(),
            input: input.clone(),
            output: None,
            context: serde_json::json!({ "input": input }),
            total_nodes,
            completed_nodes: 0,
            failed_nodes: 0,
            started_at: now,
            completed_at: None,
        }
    }

    /// Finalize the run. Status and output are frozen afterwards.
    pub fn finish(&mut self, status: RunStatus, output: Option<serde_json::Value>, now: DateTime<Utc>) {
        if self.completed_at.is_some() {
            return;
        }
        self.status = status;
        self.output = output;
        self.completed_at = Some(now);
    }

    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
