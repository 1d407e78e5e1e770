// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conductor decision audit records. Append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::RunId;

/// What the conductor decided about a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    FireNode,
    SkipNode,
    Retry,
    Abort,
    PhaseChange,
}

crate::simple_display! {
    DecisionKind {
        FireNode => "fire_node",
        SkipNode => "skip_node",
        Retry => "retry",
        Abort => "abort",
        PhaseChange => "phase_change",
    }
}

/// One audit entry. Written when the decision is taken, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConductorDecision {
    pub run_id: RunId,
    pub kind: DecisionKind,
    /// Decision-specific payload (node id, retry count, condition text …).
    #[serde(default)]
    pub data: serde_json::Value,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl ConductorDecision {
    pub fn new(
        run_id: RunId,
        kind: DecisionKind,
        data: serde_json::Value,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self { run_id, kind, data, reason: reason.into(), created_at: now }
    }
}
