// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definition schema.
//!
//! The wire shape is language-neutral; these types deserialize it from
//! JSON payload values and from HCL files alike.

use serde::{Deserialize, Serialize};

use hive_core::NodeKind;

/// Sentinel marking workflow entry.
pub const START: &str = "__start__";
/// Sentinel marking workflow termination.
pub const END: &str = "__end__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<EdgeDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: NodeKind,
    pub prompt_template: String,
    #[serde(default)]
    pub config: NodeConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Re-fires allowed after a failure. Zero means fail fast.
    pub retry_budget: u32,
    /// Fan-out width for parallel nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
    /// Swarm roles. Required (non-empty) for swarm nodes.
    pub roles: Vec<RoleDef>,
    /// Parallel nodes: collect member failures instead of failing the node.
    pub best_effort: bool,
    /// Swarm nodes: opt in to watcher-driven restarts of stale agents.
    /// Watcher restarts do not consume `retry_budget`.
    pub auto_restart: bool,
    /// Agent flavor forwarded to the executor strategy ("code reviewer").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDef {
    pub name: String,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Role-specific task description; the node prompt is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDef {
    pub from: String,
    pub to: String,
    /// Side-effect-free boolean expression over the run context.
    /// Empty means "always".
    #[serde(default)]
    pub condition: String,
    /// Lower wins: of a node's truthy outgoing edges, only the lowest
    /// priority number fires. Equal priorities within that tier all fire.
    #[serde(default)]
    pub priority: i32,
    /// Let this edge fire even when `from` failed.
    #[serde(default)]
    pub allow_failure: bool,
}

impl WorkflowDef {
    pub fn node(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges leaving `from`, sorted by priority (stable for equal values).
    pub fn edges_from(&self, from: &str) -> Vec<&EdgeDef> {
        let mut edges: Vec<&EdgeDef> = self.edges.iter().filter(|e| e.from == from).collect();
        edges.sort_by_key(|e| e.priority);
        edges
    }

    pub fn edges_into(&self, to: &str) -> Vec<&EdgeDef> {
        self.edges.iter().filter(|e| e.to == to).collect()
    }

    /// The node the single `__start__` edge points at. Validation
    /// guarantees it exists.
    pub fn entry_node(&self) -> Option<&str> {
        self.edges.iter().find(|e| e.from == START).map(|e| e.to.as_str())
    }
}

impl NodeDef {
    /// Fan-out width for parallel nodes (validated ≥ 1).
    pub fn fan_out(&self) -> u32 {
        self.config.concurrency.unwrap_or(2)
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
