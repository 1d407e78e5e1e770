// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_fixtures::Fixture;
use hive_adapters::KvStore;
use hive_core::{DecisionKind, NodeStatus, RunStatus};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn conductor(fixture: &Fixture) -> Conductor {
    Conductor::new(fixture.deps.clone(), fixture.tenant()).unwrap()
}

fn linear_def(nodes: &[(&str, u32)]) -> hive_workflow::WorkflowDef {
    let mut spec_nodes = Vec::new();
    let mut edges = vec![json!({"from": "__start__", "to": nodes[0].0})];
    for (id, retry_budget) in nodes {
        spec_nodes.push(json!({
            "id": id,
            "kind": "single",
            "prompt_template": format!("work on {id} for ${{context.input.target}}"),
            "config": {"retry_budget": retry_budget},
        }));
    }
    for pair in nodes.windows(2) {
        edges.push(json!({"from": pair[0].0, "to": pair[1].0}));
    }
    edges.push(json!({"from": nodes[nodes.len() - 1].0, "to": "__end__"}));
    hive_workflow::from_value(json!({"name": "wf", "nodes": spec_nodes, "edges": edges})).unwrap()
}

async fn execs_for_run(fixture: &Fixture, run_id: hive_core::RunId) -> Vec<hive_core::NodeExecution> {
    let scope = format!("nodeexecs/{}", fixture.tenant());
    let mut execs = Vec::new();
    for key in fixture.kv.list(&scope).await.unwrap() {
        let value = fixture.kv.get(&scope, &key).await.unwrap().unwrap().value;
        let exec: hive_core::NodeExecution = serde_json::from_value(value).unwrap();
        if exec.run_id == run_id {
            execs.push(exec);
        }
    }
    execs.sort_by_key(|e| e.created_at);
    execs
}

#[tokio::test]
async fn linear_run_completes_and_merges_context() {
    let fixture = Fixture::new();
    fixture.provider.push_text("[fact] alpha done");
    fixture.provider.push_text("[fact] beta done");

    let def = linear_def(&[("alpha", 0), ("beta", 0)]);
    let dir = tempfile::tempdir().unwrap();
    let run = conductor(&fixture)
        .run_workflow(&def, json!({"target": "src"}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.completed_nodes, 2);
    assert_eq!(run.failed_nodes, 0);
    assert!(run.is_finished());

    // Findings appended from both nodes
    let findings = run.context["findings"].as_array().unwrap();
    assert_eq!(findings.len(), 2);
    // Per-node summaries available to edge conditions
    assert_eq!(run.context["nodes"]["alpha"]["status"], "completed");

    // Prompts rendered from the context
    let prompts = fixture.provider.prompts();
    assert!(prompts[0].contains("work on alpha for src"), "{}", prompts[0]);
}

#[tokio::test]
async fn condition_routes_around_a_branch() {
    let fixture = Fixture::new();
    // alpha reports, branch is skipped, omega runs
    fixture.provider.push_text("done");
    fixture.provider.push_text("omega done");

    let def = hive_workflow::from_value(json!({
        "name": "branching",
        "nodes": [
            {"id": "alpha", "kind": "single", "prompt_template": "a"},
            {"id": "branch", "kind": "single", "prompt_template": "b"},
            {"id": "omega", "kind": "single", "prompt_template": "o"},
        ],
        "edges": [
            {"from": "__start__", "to": "alpha"},
            {"from": "alpha", "to": "branch", "condition": "context.input.deep == true"},
            {"from": "alpha", "to": "omega"},
            {"from": "branch", "to": "omega"},
            {"from": "omega", "to": "__end__"},
        ],
    }))
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let run = conductor(&fixture)
        .run_workflow(&def, json!({"deep": false}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    let execs = execs_for_run(&fixture, run.id).await;
    let branch = execs.iter().find(|e| e.node_id == "branch").unwrap();
    assert_eq!(branch.status, NodeStatus::Skipped);
    // Only two agent invocations happened
    assert_eq!(fixture.provider.calls(), 2);
}

#[tokio::test]
async fn missing_context_key_defaults_edge_to_false() {
    let fixture = Fixture::new();
    fixture.provider.push_text("done");

    let def = hive_workflow::from_value(json!({
        "name": "soft-eval",
        "nodes": [
            {"id": "alpha", "kind": "single", "prompt_template": "a"},
            {"id": "branch", "kind": "single", "prompt_template": "b"},
        ],
        "edges": [
            {"from": "__start__", "to": "alpha"},
            {"from": "alpha", "to": "branch", "condition": "context.nope == 1"},
            {"from": "alpha", "to": "__end__"},
            {"from": "branch", "to": "__end__"},
        ],
    }))
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let run = conductor(&fixture)
        .run_workflow(&def, json!({}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    // The defaulted edge left a skip decision in the audit log
    let decisions = conductor(&fixture).decision_log().for_run(&run.id).await.unwrap();
    assert!(decisions
        .iter()
        .any(|d| d.kind == DecisionKind::SkipNode && d.reason.contains("defaulted to false")));
}

#[tokio::test]
async fn lower_priority_truthy_edge_wins_exclusively() {
    let fixture = Fixture::new();
    fixture.provider.push_text("alpha done");
    fixture.provider.push_text("fast done");

    // Both outgoing edges of alpha are truthy; only the lower priority
    // number carries execution.
    let def = hive_workflow::from_value(json!({
        "name": "tiered",
        "nodes": [
            {"id": "alpha", "kind": "single", "prompt_template": "a"},
            {"id": "fast", "kind": "single", "prompt_template": "f"},
            {"id": "slow", "kind": "single", "prompt_template": "s"},
        ],
        "edges": [
            {"from": "__start__", "to": "alpha"},
            {"from": "alpha", "to": "fast", "priority": 0},
            {"from": "alpha", "to": "slow", "priority": 5},
            {"from": "fast", "to": "__end__"},
            {"from": "slow", "to": "__end__"},
        ],
    }))
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let run = conductor(&fixture)
        .run_workflow(&def, json!({}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.completed_nodes, 2);
    assert_eq!(fixture.provider.calls(), 2, "the losing tier never invoked an agent");

    let execs = execs_for_run(&fixture, run.id).await;
    let fast = execs.iter().find(|e| e.node_id == "fast").unwrap();
    assert_eq!(fast.status, NodeStatus::Completed);
    let slow = execs.iter().find(|e| e.node_id == "slow").unwrap();
    assert_eq!(slow.status, NodeStatus::Skipped);
}

#[tokio::test]
async fn equal_priorities_within_the_winning_tier_all_fire() {
    let fixture = Fixture::new();
    fixture.provider.push_text("alpha done");
    fixture.provider.push_text("left done");
    fixture.provider.push_text("right done");

    let def = hive_workflow::from_value(json!({
        "name": "cartesian",
        "nodes": [
            {"id": "alpha", "kind": "single", "prompt_template": "a"},
            {"id": "left", "kind": "single", "prompt_template": "l"},
            {"id": "right", "kind": "single", "prompt_template": "r"},
        ],
        "edges": [
            {"from": "__start__", "to": "alpha"},
            {"from": "alpha", "to": "left", "priority": 1},
            {"from": "alpha", "to": "right", "priority": 1},
            {"from": "left", "to": "__end__"},
            {"from": "right", "to": "__end__"},
        ],
    }))
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let run = conductor(&fixture)
        .run_workflow(&def, json!({}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.completed_nodes, 3);
    assert_eq!(fixture.provider.calls(), 3);
}

#[tokio::test]
async fn losing_tier_fires_when_the_lower_tier_is_false() {
    let fixture = Fixture::new();
    fixture.provider.push_text("alpha done");
    fixture.provider.push_text("fallback done");

    // The preferred edge's condition is false, so the higher-numbered
    // tier becomes the winning one.
    let def = hive_workflow::from_value(json!({
        "name": "fallthrough",
        "nodes": [
            {"id": "alpha", "kind": "single", "prompt_template": "a"},
            {"id": "preferred", "kind": "single", "prompt_template": "p"},
            {"id": "fallback", "kind": "single", "prompt_template": "f"},
        ],
        "edges": [
            {"from": "__start__", "to": "alpha"},
            {"from": "alpha", "to": "preferred", "priority": 0, "condition": "context.input.deep == true"},
            {"from": "alpha", "to": "fallback", "priority": 5},
            {"from": "preferred", "to": "__end__"},
            {"from": "fallback", "to": "__end__"},
        ],
    }))
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let run = conductor(&fixture)
        .run_workflow(&def, json!({"deep": false}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    let execs = execs_for_run(&fixture, run.id).await;
    assert_eq!(execs.iter().find(|e| e.node_id == "fallback").unwrap().status, NodeStatus::Completed);
    assert_eq!(execs.iter().find(|e| e.node_id == "preferred").unwrap().status, NodeStatus::Skipped);
}

#[tokio::test]
async fn retry_budget_refires_then_succeeds() {
    let fixture = Fixture::new();
    fixture.provider.push_error("flaky");
    fixture.provider.push_text("second try worked");

    let def = linear_def(&[("alpha", 1)]);
    let dir = tempfile::tempdir().unwrap();
    let run = conductor(&fixture)
        .run_workflow(&def, json!({"target": "x"}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.completed_nodes, 1);
    assert_eq!(run.failed_nodes, 1);

    let execs = execs_for_run(&fixture, run.id).await;
    assert_eq!(execs.len(), 2, "retry produced a fresh execution record");
    assert_eq!(execs[0].status, NodeStatus::Failed);
    assert_eq!(execs[1].status, NodeStatus::Completed);
    assert_eq!(execs[1].retry_count, 1);

    let decisions = conductor(&fixture).decision_log().for_run(&run.id).await.unwrap();
    assert!(decisions.iter().any(|d| d.kind == DecisionKind::Retry));
}

#[tokio::test]
async fn exhausted_budget_fails_the_run() {
    let fixture = Fixture::new();
    fixture.provider.push_error("broken");

    let def = linear_def(&[("alpha", 0), ("beta", 0)]);
    let dir = tempfile::tempdir().unwrap();
    let err = conductor(&fixture)
        .run_workflow(&def, json!({"target": "x"}), dir.path(), &CancellationToken::new())
        .await;

    // The handler surfaces the failed run; the stored record agrees
    assert!(err.is_ok(), "run object is returned, status carries the failure");
    let run = err.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.failed_nodes, 1);

    let decisions = conductor(&fixture).decision_log().for_run(&run.id).await.unwrap();
    assert!(decisions.iter().any(|d| d.kind == DecisionKind::Abort));
    // beta never fired
    assert_eq!(fixture.provider.calls(), 1);
}

#[tokio::test]
async fn allow_failure_edge_tolerates_a_failed_node() {
    let fixture = Fixture::new();
    fixture.provider.push_error("broken");
    fixture.provider.push_text("cleanup ran");

    let def = hive_workflow::from_value(json!({
        "name": "tolerant",
        "nodes": [
            {"id": "risky", "kind": "single", "prompt_template": "r"},
            {"id": "cleanup", "kind": "single", "prompt_template": "c"},
        ],
        "edges": [
            {"from": "__start__", "to": "risky"},
            {"from": "risky", "to": "cleanup", "allow_failure": true},
            {"from": "cleanup", "to": "__end__"},
        ],
    }))
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let run = conductor(&fixture)
        .run_workflow(&def, json!({}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.completed_nodes, 1);
    assert_eq!(run.failed_nodes, 1);
}

#[tokio::test]
async fn identical_prompt_hash_reuses_cached_result() {
    let fixture = Fixture::new();
    fixture.provider.push_text("[fact] expensive result");

    let def = linear_def(&[("alpha", 0)]);
    let dir = tempfile::tempdir().unwrap();
    let first = conductor(&fixture)
        .run_workflow(&def, json!({"target": "x"}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(fixture.provider.calls(), 1);

    // Same workflow, same input: the node is skipped-because-cached with
    // the same result and no agent invocation.
    let second = conductor(&fixture)
        .run_workflow(&def, json!({"target": "x"}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(fixture.provider.calls(), 1, "no second invocation");

    let execs = execs_for_run(&fixture, second.id).await;
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0].status, NodeStatus::Skipped);
    assert!(execs[0]
        .result_text
        .as_deref()
        .is_some_and(|t| t.contains("expensive result")));

    // A different input renders a different prompt and misses the cache
    fixture.provider.push_text("fresh");
    conductor(&fixture)
        .run_workflow(&def, json!({"target": "other"}), dir.path(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(fixture.provider.calls(), 2);
}

#[tokio::test]
async fn cancellation_finishes_the_run_cancelled() {
    let fixture = Fixture::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let def = linear_def(&[("alpha", 0)]);
    let dir = tempfile::tempdir().unwrap();
    let run = conductor(&fixture)
        .run_workflow(&def, json!({"target": "x"}), dir.path(), &cancel)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(fixture.provider.calls(), 0);
}

#[test]
fn merge_rules() {
    let clock = hive_core::FakeClock::new();
    use hive_core::clock::Clock;
    let mut context = json!({"input": {"target": "x"}, "phase": "one"});

    let mut exec = hive_core::NodeExecution::new(
        hive_core::RunId::new(),
        "alpha",
        hive_core::NodeKind::Single,
        "p",
        "h",
        clock.utc(),
    );
    exec.status = NodeStatus::Completed;
    exec.findings = vec![hive_core::Finding::new(
        "alpha",
        hive_core::FindingKind::Fact,
        "f1",
        clock.utc(),
    )];
    exec.files_modified = vec!["a.rs".to_string(), "b.rs".to_string()];
    exec.result_json = Some(json!({"phase": "two", "input": "clobber", "extra": 1}));

    merge_context(&mut context, &exec);
    // scalars last-writer-wins
    assert_eq!(context["phase"], "two");
    assert_eq!(context["extra"], 1);
    // reserved keys protected
    assert_eq!(context["input"]["target"], "x");
    // findings appended
    assert_eq!(context["findings"].as_array().unwrap().len(), 1);

    // second merge: file set unions, findings keep appending
    let mut exec2 = exec.clone();
    exec2.node_id = "beta".to_string();
    exec2.files_modified = vec!["b.rs".to_string(), "c.rs".to_string()];
    merge_context(&mut context, &exec2);
    let files: Vec<&str> =
        context["files_modified"].as_array().unwrap().iter().filter_map(|v| v.as_str()).collect();
    assert_eq!(files, vec!["a.rs", "b.rs", "c.rs"]);
    assert_eq!(context["findings"].as_array().unwrap().len(), 2);
    assert_eq!(context["nodes"]["beta"]["status"], "completed");
}
