// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hive_core::NodeKind;

fn def() -> WorkflowDef {
    WorkflowDef {
        name: "review".to_string(),
        description: String::new(),
        nodes: vec![
            NodeDef {
                id: "explore".to_string(),
                name: None,
                kind: NodeKind::Single,
                prompt_template: "look around".to_string(),
                config: NodeConfig::default(),
            },
            NodeDef {
                id: "verify".to_string(),
                name: None,
                kind: NodeKind::Single,
                prompt_template: "check".to_string(),
                config: NodeConfig::default(),
            },
        ],
        edges: vec![
            EdgeDef {
                from: START.to_string(),
                to: "explore".to_string(),
                condition: String::new(),
                priority: 0,
                allow_failure: false,
            },
            EdgeDef {
                from: "explore".to_string(),
                to: "verify".to_string(),
                condition: String::new(),
                priority: 5,
                allow_failure: false,
            },
            EdgeDef {
                from: "explore".to_string(),
                to: END.to_string(),
                condition: "context.done".to_string(),
                priority: 1,
                allow_failure: false,
            },
            EdgeDef {
                from: "verify".to_string(),
                to: END.to_string(),
                condition: String::new(),
                priority: 0,
                allow_failure: false,
            },
        ],
    }
}

#[test]
fn node_lookup() {
    let def = def();
    assert!(def.node("explore").is_some());
    assert!(def.node("nope").is_none());
}

#[test]
fn edges_from_sorted_by_priority() {
    let def = def();
    let edges = def.edges_from("explore");
    assert_eq!(edges.len(), 2);
    // priority 1 (to __end__) before priority 5 (to verify)
    assert_eq!(edges[0].to, END);
    assert_eq!(edges[1].to, "verify");
}

#[test]
fn entry_node() {
    assert_eq!(def().entry_node(), Some("explore"));
}

#[test]
fn fan_out_defaults() {
    let mut node = def().nodes[0].clone();
    assert_eq!(node.fan_out(), 2);
    node.config.concurrency = Some(5);
    assert_eq!(node.fan_out(), 5);
}

#[test]
fn minimal_json_deserializes_with_defaults() {
    let def: WorkflowDef = serde_json::from_value(serde_json::json!({
        "name": "tiny",
        "nodes": [
            {"id": "only", "kind": "single", "prompt_template": "x"}
        ],
        "edges": [
            {"from": "__start__", "to": "only"},
            {"from": "only", "to": "__end__"}
        ]
    }))
    .unwrap();
    assert_eq!(def.nodes[0].config.retry_budget, 0);
    assert!(!def.nodes[0].config.best_effort);
    assert_eq!(def.edges[0].priority, 0);
    assert_eq!(def.edges[0].condition, "");
}
