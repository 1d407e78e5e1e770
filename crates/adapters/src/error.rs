// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter error type and its mapping onto the workspace taxonomy.

use hive_core::ErrorKind;

/// Failure from a backend primitive.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("io failure in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bad record in {context}: {source}")]
    Corrupt {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("version conflict on {key}: expected {expected}, found {found}")]
    VersionConflict { key: String, expected: u64, found: u64 },

    #[error("blob key escapes the store root: {key:?}")]
    UnsafeKey { key: String },

    #[error("queue backend failure: {0}")]
    Queue(String),

    #[error("stale receipt for {job_id}")]
    StaleReceipt { job_id: String },

    #[error("task launch failure: {0}")]
    TaskLaunch(String),

    #[error("tmux failure: {0}")]
    Tmux(String),

    #[error("provider failure: {0}")]
    Provider(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl AdapterError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    pub fn corrupt(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Corrupt { context: context.into(), source }
    }

    /// Classify onto the stable taxonomy. IO and queue failures are
    /// retryable; corruption and unsafe keys are not.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::Io { .. } | AdapterError::Queue(_) | AdapterError::Provider(_) => {
                ErrorKind::TransientBackend
            }
            AdapterError::Corrupt { .. } => ErrorKind::PermanentBackend,
            AdapterError::VersionConflict { .. } | AdapterError::StaleReceipt { .. } => {
                ErrorKind::Conflict
            }
            AdapterError::UnsafeKey { .. } => ErrorKind::Security,
            AdapterError::TaskLaunch(_) | AdapterError::Tmux(_) => ErrorKind::Handler,
            AdapterError::Cancelled => ErrorKind::Timeout,
        }
    }
}
