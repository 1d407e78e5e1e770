// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-engine: everything that runs.
//!
//! The dispatch engine pulls leased messages and drives jobs end-to-end
//! through an executor strategy. The conductor walks workflow DAGs, firing
//! single, parallel, and swarm nodes; swarms coordinate through the
//! blackboard while the tiered watcher keeps them alive.

pub mod board;
pub mod conductor;
pub mod context;
pub mod decision_log;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod retry;
pub mod strategy;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use board::{BoardStore, ClaimResult};
pub use conductor::{Conductor, ConductorDeps};
pub use context::{ArtifactSink, HeartbeatHandle, JobContext};
pub use decision_log::DecisionLog;
pub use dispatch::DispatchEngine;
pub use error::EngineError;
pub use handlers::{ChatHandler, EchoHandler, WorkflowHandler};
pub use registry::{FieldKind, FieldSpec, Handler, HandlerRegistry, HandlerSpec};
pub use strategy::{AgentRun, AgentSpec, ExecResult, ExecutorStrategy, InProcessStrategy,
    MuxStrategy, TaskLaunchStrategy};
pub use watcher::{EscalationSignal, Tier1Decision, Tier1Watcher, Tier2Action, Tier2Handler};

pub type Result<T> = std::result::Result<T, EngineError>;
