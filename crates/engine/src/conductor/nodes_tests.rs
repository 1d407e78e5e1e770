// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::conductor::Conductor;
use crate::test_fixtures::Fixture;
use hive_core::{NodeStatus, RunId};
use hive_workflow::NodeDef;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn firing_ctx(fixture: &Fixture, dir: &tempfile::TempDir) -> FiringCtx {
    FiringCtx {
        deps: fixture.deps.clone(),
        tenant: fixture.tenant(),
        knowledge: fixture.deps.memory.knowledge(&fixture.tenant()).unwrap(),
        run_id: RunId::new(),
        context: json!({"input": {"target": "src"}}),
        workspace_dir: dir.path().to_path_buf(),
        cancel: CancellationToken::new(),
        retry_count: 0,
    }
}

fn node(value: serde_json::Value) -> NodeDef {
    serde_json::from_value(value).unwrap()
}

#[test]
fn prompt_hash_is_stable_sha256() {
    assert_eq!(hash_prompt("abc"), hash_prompt("abc"));
    assert_ne!(hash_prompt("abc"), hash_prompt("abd"));
    assert_eq!(hash_prompt("abc").len(), 64);
}

#[tokio::test]
async fn single_node_parses_findings_and_questions() {
    let fixture = Fixture::new();
    let dir = tempfile::tempdir().unwrap();
    fixture.provider.push_text("[fact] cache is tenant-keyed\n[question] is the TTL fixed?\nplain line");

    let exec = fire(
        firing_ctx(&fixture, &dir),
        node(json!({"id": "explore", "kind": "single", "prompt_template": "survey ${context.input.target}"})),
        Conductor::new(fixture.deps.clone(), fixture.tenant()).unwrap().clone_for_cache(),
    )
    .await
    .unwrap();

    assert_eq!(exec.status, NodeStatus::Completed);
    assert_eq!(exec.agent_id.as_deref(), Some("explore"));
    assert_eq!(exec.findings.len(), 1);
    assert_eq!(exec.findings[0].kind, hive_core::FindingKind::Fact);
    assert!(exec.token_count > 0);
    assert!(!exec.prompt_hash.is_empty());

    // The template rendered against the run context
    assert!(fixture.provider.prompts()[0].contains("survey src"));
}

#[tokio::test]
async fn failed_agent_settles_the_exec_failed() {
    let fixture = Fixture::new();
    let dir = tempfile::tempdir().unwrap();
    fixture.provider.push_error("model unavailable");

    let exec = fire(
        firing_ctx(&fixture, &dir),
        node(json!({"id": "explore", "kind": "single", "prompt_template": "x"})),
        Conductor::new(fixture.deps.clone(), fixture.tenant()).unwrap().clone_for_cache(),
    )
    .await
    .unwrap();

    assert_eq!(exec.status, NodeStatus::Failed);
    assert!(exec.error_message.as_deref().is_some_and(|m| m.contains("model unavailable")));
    assert!(exec.error_kind.is_some());
}

#[tokio::test]
async fn parallel_fans_out_with_shard_hints() {
    let fixture = Fixture::new();
    let dir = tempfile::tempdir().unwrap();
    fixture.provider.push_text("[fact] shard one");
    fixture.provider.push_text("[fact] shard two");
    fixture.provider.push_text("[fact] shard three");

    let exec = fire(
        firing_ctx(&fixture, &dir),
        node(json!({
            "id": "scan",
            "kind": "parallel",
            "prompt_template": "scan shard ${shard} of ${shard_count}",
            "config": {"concurrency": 3},
        })),
        Conductor::new(fixture.deps.clone(), fixture.tenant()).unwrap().clone_for_cache(),
    )
    .await
    .unwrap();

    assert_eq!(exec.status, NodeStatus::Completed);
    assert_eq!(exec.findings.len(), 3);
    assert_eq!(exec.result_json.as_ref().unwrap()["shards_completed"], 3);

    let mut prompts = fixture.provider.prompts();
    prompts.sort();
    assert!(prompts.iter().any(|p| p.contains("shard 1 of 3")));
    assert!(prompts.iter().any(|p| p.contains("shard 3 of 3")));
}

#[tokio::test]
async fn parallel_failure_fails_the_node_unless_best_effort() {
    let fixture = Fixture::new();
    let dir = tempfile::tempdir().unwrap();
    fixture.provider.push_text("ok");
    fixture.provider.push_error("shard down");

    let exec = fire(
        firing_ctx(&fixture, &dir),
        node(json!({
            "id": "scan",
            "kind": "parallel",
            "prompt_template": "s",
            "config": {"concurrency": 2},
        })),
        Conductor::new(fixture.deps.clone(), fixture.tenant()).unwrap().clone_for_cache(),
    )
    .await
    .unwrap();
    assert_eq!(exec.status, NodeStatus::Failed);
    assert!(exec.error_message.as_deref().is_some_and(|m| m.contains("shards failed")));
}

#[tokio::test]
async fn parallel_best_effort_collects_failures() {
    let fixture = Fixture::new();
    let dir = tempfile::tempdir().unwrap();
    fixture.provider.push_text("[fact] survived");
    fixture.provider.push_error("shard down");

    let exec = fire(
        firing_ctx(&fixture, &dir),
        node(json!({
            "id": "scan",
            "kind": "parallel",
            "prompt_template": "s",
            "config": {"concurrency": 2, "best_effort": true},
        })),
        Conductor::new(fixture.deps.clone(), fixture.tenant()).unwrap().clone_for_cache(),
    )
    .await
    .unwrap();

    assert_eq!(exec.status, NodeStatus::Completed);
    assert_eq!(exec.result_json.as_ref().unwrap()["shards_failed"], 1);
    assert_eq!(exec.findings.len(), 1);
}

#[tokio::test]
async fn swarm_runs_roles_through_the_board() {
    let fixture = Fixture::new();
    let dir = tempfile::tempdir().unwrap();
    fixture.provider.push_text("[fact] scout report\n[question] which cache?");
    fixture.provider.push_text("[hypothesis] verifier theory");

    let exec = fire(
        firing_ctx(&fixture, &dir),
        node(json!({
            "id": "audit",
            "kind": "swarm",
            "prompt_template": "audit ${context.input.target}",
            "config": {"roles": [
                {"name": "scout", "interests": ["cache"]},
                {"name": "verifier"},
            ]},
        })),
        Conductor::new(fixture.deps.clone(), fixture.tenant()).unwrap().clone_for_cache(),
    )
    .await
    .unwrap();

    assert_eq!(exec.status, NodeStatus::Completed);
    // Findings aggregated from the board
    assert_eq!(exec.findings.len(), 2);
    let result = exec.result_json.as_ref().unwrap();
    assert_eq!(result["agents_completed"], 2);
    assert_eq!(result["agents_failed"], 0);
    assert_eq!(result["questions"][0], "which cache?");

    // Role and board path landed in the prompts
    let prompts = fixture.provider.prompts();
    assert!(prompts.iter().any(|p| p.contains("`scout`")));
    assert!(prompts.iter().any(|p| p.contains("board-")));

    // Final cleanup pass removed the board file
    let boards: Vec<_> = std::fs::read_dir(dir.path().join("boards"))
        .map(|entries| entries.filter_map(|e| e.ok()).collect())
        .unwrap_or_default();
    assert!(boards.is_empty(), "board file cleaned up");
}

#[tokio::test]
async fn swarm_with_all_agents_failed_fails_the_node() {
    let fixture = Fixture::new();
    let dir = tempfile::tempdir().unwrap();
    fixture.provider.push_error("a down");
    fixture.provider.push_error("b down");

    let exec = fire(
        firing_ctx(&fixture, &dir),
        node(json!({
            "id": "audit",
            "kind": "swarm",
            "prompt_template": "x",
            "config": {"roles": [{"name": "a"}, {"name": "b"}]},
        })),
        Conductor::new(fixture.deps.clone(), fixture.tenant()).unwrap().clone_for_cache(),
    )
    .await
    .unwrap();
    assert_eq!(exec.status, NodeStatus::Failed);
}

#[tokio::test]
async fn knowledge_context_is_stitched_above_the_prompt() {
    let fixture = Fixture::new();
    let dir = tempfile::tempdir().unwrap();

    // Seed a golden rule in the tenant's knowledge partition before the
    // firing resolves its handle
    fixture
        .deps
        .memory
        .knowledge(&fixture.tenant())
        .unwrap()
        .upsert_heuristic(hive_storage::Heuristic {
            id: "h1".to_string(),
            text: "Always check the lease".to_string(),
            base: 0.8,
            domain: hive_storage::Domain::General,
            validation_count: hive_storage::GOLDEN_THRESHOLD,
            updated_at: chrono::Utc::now(),
        })
        .unwrap();

    fixture.provider.push_text("ok");
    fire(
        firing_ctx(&fixture, &dir),
        node(json!({"id": "explore", "kind": "single", "prompt_template": "the task"})),
        Conductor::new(fixture.deps.clone(), fixture.tenant()).unwrap().clone_for_cache(),
    )
    .await
    .unwrap();

    let prompt = &fixture.provider.prompts()[0];
    assert!(prompt.contains("Golden rules"), "{prompt}");
    assert!(prompt.contains("Always check the lease"));
    // Knowledge sits above the node instructions
    assert!(prompt.find("Golden rules").unwrap() < prompt.find("the task").unwrap());
}
