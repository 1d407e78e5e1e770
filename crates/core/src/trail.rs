// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pheromone trails: append-only, time-decayed records tying an agent
//! action to a location.
//!
//! Trails store their raw strength; readers compute effective strength with
//! an exponential half-life. Records are never rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::RunId;

/// Half-life for trail decay, in days.
pub const TRAIL_HALF_LIFE_DAYS: f64 = 7.0;

/// What a trail's location refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    File,
    Function,
    Class,
    Concept,
    Tag,
}

crate::simple_display! {
    LocationKind {
        File => "file",
        Function => "function",
        Class => "class",
        Concept => "concept",
        Tag => "tag",
    }
}

/// The category of a trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scent {
    Discovery,
    Warning,
    Blocker,
    Hot,
    Cold,
}

crate::simple_display! {
    Scent {
        Discovery => "discovery",
        Warning => "warning",
        Blocker => "blocker",
        Hot => "hot",
        Cold => "cold",
    }
}

/// An append-only trail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    pub location: String,
    pub location_kind: LocationKind,
    pub scent: Scent,
    /// Raw strength in [0, 1] as written; decay is applied at read time.
    pub strength: f64,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Trail {
    pub fn new(
        location: impl Into<String>,
        location_kind: LocationKind,
        scent: Scent,
        strength: f64,
        agent_id: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: None,
            location: location.into(),
            location_kind,
            scent,
            strength: strength.clamp(0.0, 1.0),
            agent_id: agent_id.into(),
            node_id: None,
            message: message.into(),
            tags: Vec::new(),
            created_at: now,
            expires_at: None,
        }
    }

    crate::setters! {
        set {
            tags: Vec<String>,
        }
        option {
            run_id: RunId,
            node_id: String,
            expires_at: DateTime<Utc>,
        }
    }

    /// Strength after exponential decay with a 7-day half-life.
    pub fn effective_strength(&self, now: DateTime<Utc>) -> f64 {
        let age_ms = (now - self.created_at).num_milliseconds().max(0) as f64;
        let age_days = age_ms / (24.0 * 3600.0 * 1000.0);
        self.strength * 0.5f64.powf(age_days / TRAIL_HALF_LIFE_DAYS)
    }

    /// Past `expires_at` trails are filtered at read time; compaction is a
    /// separate maintenance pass.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| now >= t)
    }
}

#[cfg(test)]
#[path = "trail_tests.rs"]
mod tests;
