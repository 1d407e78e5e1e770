// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client → daemon requests.

use serde::{Deserialize, Serialize};

/// The capability surface clients call. The credential travels with every
/// request; the daemon's tenant resolver maps it (or its absence) to a
/// tenant before anything else happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    SubmitJob {
        job_type: String,
        payload: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credential: Option<String>,
    },
    GetJob {
        job_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credential: Option<String>,
    },
    ListJobs {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
        #[serde(default)]
        offset: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credential: Option<String>,
    },
    CancelJob {
        job_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credential: Option<String>,
    },
    /// Per-run blackboard summaries for the tenant's active swarms.
    ListAgents {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credential: Option<String>,
    },
    Health,
}

impl Request {
    pub fn credential(&self) -> Option<&str> {
        match self {
            Request::SubmitJob { credential, .. }
            | Request::GetJob { credential, .. }
            | Request::ListJobs { credential, .. }
            | Request::CancelJob { credential, .. }
            | Request::ListAgents { credential } => credential.as_deref(),
            Request::Health => None,
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
