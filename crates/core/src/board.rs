// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blackboard document: the shared per-run JSON file swarm agents
//! coordinate through.
//!
//! This module is the value-typed document only. Locking, durability, and
//! the read-modify-write cycle live in the engine; keeping the document a
//! plain value means every write serializes the whole state, which is what
//! durability requires anyway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::finding::Finding;
use crate::run::RunId;

crate::define_id! {
    /// Unique identifier for a claim chain.
    pub struct ChainId("chn-");
}

/// Coordination state of a registered swarm agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardAgentState {
    Active,
    Completed,
    Failed,
    Stale,
}

crate::simple_display! {
    BoardAgentState {
        Active => "active",
        Completed => "completed",
        Failed => "failed",
        Stale => "stale",
    }
}

/// Per-agent entry in the blackboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardAgent {
    pub task: String,
    pub state: BoardAgentState,
    pub heartbeat_at: DateTime<Utc>,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Index into `findings` up to which this agent has read.
    #[serde(default)]
    pub cursor: usize,
}

/// A free-form message between agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardMessage {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A queued unit of work agents may pick up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardTask {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An open question surfaced by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardQuestion {
    pub agent_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Status of a claim chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Active,
    Completed,
    Expired,
    Released,
}

crate::simple_display! {
    ChainStatus {
        Active => "active",
        Completed => "completed",
        Expired => "expired",
        Released => "released",
    }
}

/// An atomic, time-bounded reservation of a set of files by one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimChain {
    pub agent_id: String,
    pub files: Vec<String>,
    pub reason: String,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ChainStatus,
}

impl ClaimChain {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ChainStatus::Active && now < self.expires_at
    }
}

/// The whole shared document for one swarm run.
///
/// Field names are stable: any implementer must be able to parse this file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blackboard {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub agents: BTreeMap<String, BoardAgent>,
    /// Append-only.
    #[serde(default)]
    pub findings: Vec<Finding>,
    /// Append-only.
    #[serde(default)]
    pub messages: Vec<BoardMessage>,
    /// Append-only.
    #[serde(default)]
    pub task_queue: Vec<BoardTask>,
    #[serde(default)]
    pub questions: Vec<BoardQuestion>,
    #[serde(default)]
    pub claim_chains: BTreeMap<ChainId, ClaimChain>,
}

impl Blackboard {
    pub fn new(run_id: RunId, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            created_at: now,
            agents: BTreeMap::new(),
            findings: Vec::new(),
            messages: Vec::new(),
            task_queue: Vec::new(),
            questions: Vec::new(),
            claim_chains: BTreeMap::new(),
        }
    }

    /// Files currently held by `active` chains (after expiry is accounted for).
    pub fn active_files(&self, now: DateTime<Utc>) -> Vec<&str> {
        let mut files: Vec<&str> = self
            .claim_chains
            .values()
            .filter(|c| c.is_active(now))
            .flat_map(|c| c.files.iter().map(String::as_str))
            .collect();
        files.sort_unstable();
        files.dedup();
        files
    }

    /// Active chains overlapping any of `files`.
    pub fn conflicting_chains(&self, files: &[String], now: DateTime<Utc>) -> Vec<ChainId> {
        self.claim_chains
            .iter()
            .filter(|(_, c)| c.is_active(now) && c.files.iter().any(|f| files.contains(f)))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Transition expired chains to `expired`. Called lazily by the writer
    /// on each read-modify-write cycle.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut pruned = 0;
        for chain in self.claim_chains.values_mut() {
            if chain.status == ChainStatus::Active && now >= chain.expires_at {
                chain.status = ChainStatus::Expired;
                pruned += 1;
            }
        }
        pruned
    }

    /// Agents whose heartbeat is older than `timeout`.
    pub fn stale_agents(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> Vec<&str> {
        self.agents
            .iter()
            .filter(|(_, a)| {
                a.state == BoardAgentState::Active && now - a.heartbeat_at > timeout
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn count_in_state(&self, state: BoardAgentState) -> usize {
        self.agents.values().filter(|a| a.state == state).count()
    }

    /// All agents reached a terminal coordination state and no unclaimed
    /// work remains.
    pub fn is_complete(&self) -> bool {
        !self.agents.is_empty()
            && self.agents.values().all(|a| {
                matches!(a.state, BoardAgentState::Completed | BoardAgentState::Failed)
            })
            && self.task_queue.iter().all(|t| t.claimed_by.is_some())
    }

    /// Document invariants that must hold after every write:
    /// no file in two active chains, and every active chain owned by a
    /// registered agent. Violations indicate a writer bypassed the lock.
    pub fn check_invariants(&self, now: DateTime<Utc>) -> Result<(), String> {
        let mut seen: Vec<&str> = Vec::new();
        for (id, chain) in &self.claim_chains {
            if !chain.is_active(now) {
                continue;
            }
            if !self.agents.contains_key(&chain.agent_id) {
                return Err(format!("chain {} held by unregistered agent {}", id, chain.agent_id));
            }
            for file in &chain.files {
                if seen.contains(&file.as_str()) {
                    return Err(format!("file {} appears in more than one active chain", file));
                }
                seen.push(file);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod tests;
