// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node execution record.
//!
//! One record per node firing; a retry creates a fresh record rather than
//! rewriting the failed one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::finding::Finding;
use crate::run::RunId;

crate::define_id! {
    /// Unique identifier for a single node firing.
    pub struct NodeExecId("nex-");
}

/// The three node semantics the conductor knows how to fire.
///
/// Kept as a tagged variant rather than a trait hierarchy: the kinds share
/// almost no behavior beyond "execute and report".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Single,
    Parallel,
    Swarm,
}

crate::simple_display! {
    NodeKind {
        Single => "single",
        Parallel => "parallel",
        Swarm => "swarm",
    }
}

/// Status of one node firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

crate::simple_display! {
    NodeStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Failed | NodeStatus::Skipped)
    }
}

/// Record of one firing of one node in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: NodeExecId,
    pub run_id: RunId,
    pub node_id: String,
    pub node_kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Upstream session (tmux pane, container task) when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Full text actually sent to the agent.
    pub prompt: String,
    /// sha-256 of the prompt, used to deduplicate identical re-fires.
    pub prompt_hash: String,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_text: Option<String>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub token_count: u64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub created_at: DateTime<Utc>,
}

impl NodeExecution {
    pub fn new(
        run_id: RunId,
        node_id: impl Into<String>,
        node_kind: NodeKind,
        prompt: impl Into<String>,
        prompt_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NodeExecId::new(),
            run_id,
            node_id: node_id.into(),
            node_kind,
            agent_id: None,
            session_id: None,
            prompt: prompt.into(),
            prompt_hash: prompt_hash.into(),
            status: NodeStatus::Pending,
            result_json: None,
            result_text: None,
            findings: Vec::new(),
            files_modified: Vec::new(),
            duration_ms: 0,
            token_count: 0,
            retry_count: 0,
            error_message: None,
            error_kind: None,
            created_at: now,
        }
    }

    pub fn complete(
        &mut self,
        result_text: Option<String>,
        result_json: Option<serde_json::Value>,
        duration_ms: u64,
    ) {
        self.status = NodeStatus::Completed;
        self.result_text = result_text;
        self.result_json = result_json;
        self.duration_ms = duration_ms;
    }

    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>, duration_ms: u64) {
        self.status = NodeStatus::Failed;
        self.error_kind = Some(kind);
        self.error_message = Some(message.into());
        self.duration_ms = duration_ms;
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
