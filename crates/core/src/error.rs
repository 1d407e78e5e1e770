// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by every crate in the workspace.
//!
//! The [`ErrorKind`] names are stable and user-visible: every terminal job
//! carries one so clients can tell "fix your input" from "retry later".

use serde::{Deserialize, Serialize};

use crate::validate::ValidateError;

/// Stable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input rejected before any side effect.
    Validation,
    /// Addressed entity absent.
    NotFound,
    /// CAS miss, duplicate, or claim-chain block.
    Conflict,
    /// Registered handler raised / returned an error.
    Handler,
    /// Deadline exceeded.
    Timeout,
    /// Queue/store/blob transient failure; retried within a small budget.
    TransientBackend,
    /// Corruption or schema mismatch. Operator intervention required.
    PermanentBackend,
    /// Identifier rejected at a deep check; a caller skipped validation.
    Security,
}

crate::simple_display! {
    ErrorKind {
        Validation => "validation",
        NotFound => "not_found",
        Conflict => "conflict",
        Handler => "handler",
        Timeout => "timeout",
        TransientBackend => "transient_backend",
        PermanentBackend => "permanent_backend",
        Security => "security",
    }
}

impl ErrorKind {
    /// Terminal-state kinds may be written to a FAILED job record.
    /// Transient kinds must instead return the lease for redelivery.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ErrorKind::TransientBackend)
    }

    /// Kinds that abort the worker and demand operator attention.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::PermanentBackend | ErrorKind::Security)
    }
}

/// A classified error: kind plus human message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Handler, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientBackend, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentBackend, message)
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Security, message)
    }
}

impl From<ValidateError> for CoreError {
    fn from(err: ValidateError) -> Self {
        Self::validation(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
