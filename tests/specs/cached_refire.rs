// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Re-running a workflow with identical input reuses the cached node
//! result; no agent invocation is observed the second time.

use super::support::Harness;
use hive_core::NodeStatus;
use hive_engine::Conductor;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn def() -> hive_workflow::WorkflowDef {
    hive_workflow::from_value(json!({
        "name": "analyze",
        "nodes": [{
            "id": "inspect",
            "kind": "single",
            "prompt_template": "inspect ${context.input.target}",
        }],
        "edges": [
            {"from": "__start__", "to": "inspect"},
            {"from": "inspect", "to": "__end__"},
        ],
    }))
    .unwrap()
}

#[tokio::test]
async fn identical_rerun_skips_the_agent() {
    let harness = Harness::new();
    harness.provider.push_text("[fact] the cache is fine");

    let conductor = Conductor::new(harness.deps.clone(), harness.tenant()).expect("conductor");
    let dir = tempfile::tempdir().unwrap();

    let first = conductor
        .run_workflow(&def(), json!({"target": "src"}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.completed_nodes, 1);
    assert_eq!(harness.provider.calls(), 1);

    let second = conductor
        .run_workflow(&def(), json!({"target": "src"}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(harness.provider.calls(), 1, "cached result, no second invocation");

    // The second run's node execution is recorded as skipped with the
    // first run's result attached.
    let scope = format!("nodeexecs/{}", harness.tenant());
    let mut cached_exec = None;
    for key in hive_adapters::KvStore::list(harness.kv.as_ref(), &scope).await.unwrap() {
        let value =
            hive_adapters::KvStore::get(harness.kv.as_ref(), &scope, &key).await.unwrap().unwrap();
        let exec: hive_core::NodeExecution = serde_json::from_value(value.value).unwrap();
        if exec.run_id == second.id {
            cached_exec = Some(exec);
        }
    }
    let exec = cached_exec.expect("second run recorded an execution");
    assert_eq!(exec.status, NodeStatus::Skipped);
    assert!(exec.result_text.as_deref().unwrap().contains("the cache is fine"));
    assert_eq!(exec.findings.len(), 1);
}
