// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.
//!
//! Every variant maps onto the stable taxonomy; the dispatcher uses
//! `kind()` to decide between a terminal FAILED write and returning the
//! lease for redelivery.

use hive_adapters::AdapterError;
use hive_core::{ChainId, ErrorKind, ValidateError};
use hive_storage::StorageError;
use hive_workflow::WorkflowError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("workflow rejected: {0}")]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    BadIdentifier(#[from] ValidateError),

    #[error("unknown job type {job_type:?}")]
    UnknownJobType { job_type: String },

    #[error("payload field {field:?} {problem}")]
    PayloadSchema { field: String, problem: String },

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("deadline exceeded after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("claim blocked by {0:?}")]
    ClaimBlocked(Vec<ChainId>),

    #[error("blackboard lock held too long at {path}")]
    BoardLocked { path: String },

    #[error("blackboard invariant violated: {0}")]
    BoardInvariant(String),

    #[error("agent {agent_id} exited with configuration error")]
    AgentConfig { agent_id: String },

    #[error("io failure in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Adapter(e) => e.kind(),
            EngineError::Storage(e) => e.kind(),
            EngineError::Workflow(_)
            | EngineError::BadIdentifier(_)
            | EngineError::UnknownJobType { .. }
            | EngineError::PayloadSchema { .. } => ErrorKind::Validation,
            EngineError::Handler(_) | EngineError::AgentConfig { .. } => ErrorKind::Handler,
            EngineError::Timeout(_) | EngineError::Cancelled => ErrorKind::Timeout,
            EngineError::ClaimBlocked(_) => ErrorKind::Conflict,
            EngineError::BoardLocked { .. } | EngineError::Io { .. } => ErrorKind::TransientBackend,
            EngineError::BoardInvariant(_) => ErrorKind::PermanentBackend,
        }
    }
}
