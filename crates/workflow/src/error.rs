// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow loading and validation errors.
//!
//! Everything here is a `validation` failure in the workspace taxonomy:
//! the definition is rejected before any side effect.

use hive_core::ValidateError;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse workflow: {0}")]
    Parse(String),

    #[error(transparent)]
    BadIdentifier(#[from] ValidateError),

    #[error("duplicate node id {id:?}")]
    DuplicateNode { id: String },

    #[error("edge references unknown node {id:?}")]
    UnknownNode { id: String },

    #[error("workflow must have exactly one edge out of __start__, found {count}")]
    StartEdges { count: usize },

    #[error("__end__ cannot have outgoing edges")]
    EndHasOutgoing,

    #[error("node {id:?} has no outgoing edge")]
    DeadEnd { id: String },

    #[error("workflow contains a cycle through {id:?}")]
    Cycle { id: String },

    #[error("swarm node {id:?} has no roles")]
    NoRoles { id: String },

    #[error("parallel node {id:?} needs concurrency >= 1")]
    BadConcurrency { id: String },

    #[error("auto_restart is only valid on swarm nodes, found on {id:?}")]
    BadAutoRestart { id: String },

    #[error("bad condition on edge {from} -> {to}: {message}")]
    BadCondition { from: String, to: String, message: String },

    #[error("condition parse error at byte {pos}: {message}")]
    ConditionSyntax { pos: usize, message: String },

    #[error("condition evaluation failed: {0}")]
    ConditionEval(String),
}
