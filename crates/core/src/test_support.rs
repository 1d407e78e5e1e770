// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers and proptest strategies.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

/// Proptest strategies for core enum types.
pub mod strategies {
    use proptest::prelude::*;

    use crate::error::ErrorKind;
    use crate::finding::{FindingKind, Importance};
    use crate::job::JobState;
    use crate::node::{NodeKind, NodeStatus};
    use crate::trail::Scent;

    pub fn arb_job_state() -> impl Strategy<Value = JobState> {
        prop_oneof![
            Just(JobState::Queued),
            Just(JobState::Running),
            Just(JobState::Succeeded),
            Just(JobState::Failed),
            Just(JobState::Cancelled),
        ]
    }

    pub fn arb_error_kind() -> impl Strategy<Value = ErrorKind> {
        prop_oneof![
            Just(ErrorKind::Validation),
            Just(ErrorKind::NotFound),
            Just(ErrorKind::Conflict),
            Just(ErrorKind::Handler),
            Just(ErrorKind::Timeout),
            Just(ErrorKind::TransientBackend),
            Just(ErrorKind::PermanentBackend),
            Just(ErrorKind::Security),
        ]
    }

    pub fn arb_node_kind() -> impl Strategy<Value = NodeKind> {
        prop_oneof![Just(NodeKind::Single), Just(NodeKind::Parallel), Just(NodeKind::Swarm)]
    }

    pub fn arb_node_status() -> impl Strategy<Value = NodeStatus> {
        prop_oneof![
            Just(NodeStatus::Pending),
            Just(NodeStatus::Running),
            Just(NodeStatus::Completed),
            Just(NodeStatus::Failed),
            Just(NodeStatus::Skipped),
        ]
    }

    pub fn arb_finding_kind() -> impl Strategy<Value = FindingKind> {
        prop_oneof![
            Just(FindingKind::Discovery),
            Just(FindingKind::Warning),
            Just(FindingKind::Decision),
            Just(FindingKind::Blocker),
            Just(FindingKind::Fact),
            Just(FindingKind::Hypothesis),
        ]
    }

    pub fn arb_importance() -> impl Strategy<Value = Importance> {
        prop_oneof![
            Just(Importance::Low),
            Just(Importance::Medium),
            Just(Importance::High),
            Just(Importance::Critical),
        ]
    }

    pub fn arb_scent() -> impl Strategy<Value = Scent> {
        prop_oneof![
            Just(Scent::Discovery),
            Just(Scent::Warning),
            Just(Scent::Blocker),
            Just(Scent::Hot),
            Just(Scent::Cold),
        ]
    }

    /// A valid base-rule identifier (1–32 chars).
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z0-9][A-Za-z0-9_-]{0,30}[A-Za-z0-9]",
            "[A-Za-z0-9]",
        ]
    }
}
