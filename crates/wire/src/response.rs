// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon → client responses.

use serde::{Deserialize, Serialize};

use hive_core::ErrorKind;

use crate::types::{BoardSummary, HealthSummary, JobDetail, JobSummary};

/// Typed error body. `kind` is stable so clients can tell "fix your
/// input" from "retry later" without string matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    JobSubmitted { job_id: String },
    Job { job: Box<JobDetail> },
    Jobs { jobs: Vec<JobSummary> },
    JobCancelled { job_id: String, state: String },
    Agents { boards: Vec<BoardSummary> },
    Health { health: HealthSummary },
    Error { error: ErrorBody },
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error { error: ErrorBody { kind, message: message.into() } }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
