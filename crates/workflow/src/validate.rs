// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural validation of workflow definitions.
//!
//! Checks, in order: identifier hygiene, node uniqueness and kind rules,
//! edge endpoint resolution, sentinel rules (one `__start__` edge,
//! `__end__` only incoming), dead ends, acyclicity, and condition syntax.
//! All violations are `validation` errors at load; nothing fires.

use std::collections::{HashMap, HashSet, VecDeque};

use hive_core::{validate, IdKind, NodeKind};

use crate::condition::parse_condition;
use crate::error::WorkflowError;
use crate::types::{WorkflowDef, END, START};

pub fn validate_workflow(def: &WorkflowDef) -> Result<(), WorkflowError> {
    validate(&def.name, IdKind::Workflow)?;

    let mut ids = HashSet::new();
    for node in &def.nodes {
        validate(&node.id, IdKind::Node)?;
        if !ids.insert(node.id.as_str()) {
            return Err(WorkflowError::DuplicateNode { id: node.id.clone() });
        }
        match node.kind {
            NodeKind::Swarm => {
                if node.config.roles.is_empty() {
                    return Err(WorkflowError::NoRoles { id: node.id.clone() });
                }
                for role in &node.config.roles {
                    validate(&role.name, IdKind::Node)?;
                }
            }
            NodeKind::Parallel => {
                if node.config.concurrency.is_some_and(|n| n == 0) {
                    return Err(WorkflowError::BadConcurrency { id: node.id.clone() });
                }
            }
            NodeKind::Single => {}
        }
        if node.config.auto_restart && node.kind != NodeKind::Swarm {
            return Err(WorkflowError::BadAutoRestart { id: node.id.clone() });
        }
        if let Some(agent_type) = &node.config.agent_type {
            validate(agent_type, IdKind::AgentType)?;
        }
    }

    let known = |id: &str| id == START || id == END || ids.contains(id);
    for edge in &def.edges {
        if !known(&edge.from) {
            return Err(WorkflowError::UnknownNode { id: edge.from.clone() });
        }
        if !known(&edge.to) {
            return Err(WorkflowError::UnknownNode { id: edge.to.clone() });
        }
        if edge.from == END {
            return Err(WorkflowError::EndHasOutgoing);
        }
        parse_condition(&edge.condition).map_err(|e| WorkflowError::BadCondition {
            from: edge.from.clone(),
            to: edge.to.clone(),
            message: e.to_string(),
        })?;
    }

    let start_edges = def.edges.iter().filter(|e| e.from == START).count();
    if start_edges != 1 {
        return Err(WorkflowError::StartEdges { count: start_edges });
    }

    // Every node must lead somewhere
    for node in &def.nodes {
        if !def.edges.iter().any(|e| e.from == node.id) {
            return Err(WorkflowError::DeadEnd { id: node.id.clone() });
        }
    }

    check_acyclic(def, &ids)
}

/// Kahn's algorithm over the graph excluding sentinels.
fn check_acyclic(def: &WorkflowDef, ids: &HashSet<&str>) -> Result<(), WorkflowError> {
    let mut indegree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &def.edges {
        if !ids.contains(edge.from.as_str()) || !ids.contains(edge.to.as_str()) {
            continue;
        }
        outgoing.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        if let Some(count) = indegree.get_mut(edge.to.as_str()) {
            *count += 1;
        }
    }

    let mut ready: VecDeque<&str> =
        indegree.iter().filter(|(_, &count)| count == 0).map(|(id, _)| *id).collect();
    let mut visited = 0;
    while let Some(id) = ready.pop_front() {
        visited += 1;
        for &next in outgoing.get(id).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(count) = indegree.get_mut(next) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(next);
                }
            }
        }
    }

    if visited != ids.len() {
        // Any node still holding indegree sits on a cycle
        let stuck = indegree
            .iter()
            .find(|(_, &count)| count > 0)
            .map(|(id, _)| id.to_string())
            .unwrap_or_default();
        return Err(WorkflowError::Cycle { id: stuck });
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
