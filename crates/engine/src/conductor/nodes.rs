// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node executors: single, parallel, and swarm.
//!
//! All three render the node's prompt template against the run context,
//! stitch knowledge context above it, and honor cancellation at every
//! subprocess boundary. They differ only in fan-out: a single node is one
//! agent, a parallel node is N independent shards, a swarm is a set of
//! role agents coordinating through the blackboard.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use hive_core::clock::Clock;
use hive_core::{
    parse_agent_output, validate, Finding, IdKind, NodeExecution, NodeKind, NodeStatus, RunId,
    SystemClock, TenantId,
};
use hive_storage::{Knowledge, KnowledgeQuery};
use hive_workflow::{render, NodeDef, RoleDef};

use super::{CacheHandle, CachedResult, ConductorDeps};
use crate::board::BoardStore;
use crate::error::EngineError;
use crate::strategy::AgentSpec;
use crate::watcher::{Tier1Watcher, Tier2Handler, WatchExit};
use crate::Result;

/// Everything one node firing needs, owned so the firing can run as a
/// detached task.
pub(crate) struct FiringCtx {
    pub deps: ConductorDeps,
    pub tenant: TenantId,
    /// The owning tenant's knowledge partition.
    pub knowledge: std::sync::Arc<dyn Knowledge>,
    pub run_id: RunId,
    /// Snapshot of the run context at fire time.
    pub context: Value,
    pub workspace_dir: PathBuf,
    pub cancel: CancellationToken,
    pub retry_count: u32,
}

pub(crate) fn hash_prompt(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fire one node and return its settled execution record.
pub(crate) async fn fire(
    ctx: FiringCtx,
    node: NodeDef,
    cache: CacheHandle,
) -> Result<NodeExecution> {
    let clock = SystemClock;
    let prompt = assemble_prompt(&ctx, &node).await?;
    let prompt_hash = hash_prompt(&prompt);
    let mut exec =
        NodeExecution::new(ctx.run_id, &node.id, node.kind, prompt.clone(), &prompt_hash, clock.utc());
    exec.retry_count = ctx.retry_count;

    // Identical prompt with a completed result: reuse it, invoke nothing.
    if let Some(cached) = cache.lookup(&prompt_hash).await {
        exec.status = NodeStatus::Skipped;
        exec.result_text = cached.result_text;
        exec.result_json = cached.result_json;
        exec.findings = cached.findings;
        exec.files_modified = cached.files_modified;
        tracing::info!(node = %node.id, "prompt hash cached; skipping agent invocation");
        return Ok(exec);
    }

    let started = clock.now();
    let outcome = match node.kind {
        NodeKind::Single => run_single(&ctx, &node, &prompt, &mut exec).await,
        NodeKind::Parallel => run_parallel(&ctx, &node, &mut exec).await,
        NodeKind::Swarm => run_swarm(&ctx, &node, &prompt, &mut exec).await,
    };
    let elapsed = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => {
            exec.status = NodeStatus::Completed;
            exec.duration_ms = elapsed;
            cache
                .store(
                    &prompt_hash,
                    &CachedResult {
                        result_text: exec.result_text.clone(),
                        result_json: exec.result_json.clone(),
                        findings: exec.findings.clone(),
                        files_modified: exec.files_modified.clone(),
                    },
                )
                .await;
            Ok(exec)
        }
        Err(e) => {
            exec.fail(e.kind(), e.to_string(), elapsed);
            Ok(exec)
        }
    }
}

/// Knowledge context goes above the node-specific instructions.
async fn assemble_prompt(ctx: &FiringCtx, node: &NodeDef) -> Result<String> {
    let clock = SystemClock;
    let scope = json!({ "context": ctx.context });
    let rendered = render(&node.prompt_template, &scope);

    let mut query = KnowledgeQuery::new(rendered.clone());
    if let Some(domain) = ctx.context.get("input").and_then(|i| i.get("domain")).and_then(Value::as_str)
    {
        query.domain = Some(domain.parse().map_err(EngineError::Storage)?);
    }
    let knowledge = ctx.knowledge.query(&query, clock.utc()).await?;

    if knowledge.is_empty() {
        Ok(rendered)
    } else {
        Ok(format!("{knowledge}\n---\n\n{rendered}"))
    }
}

fn agent_deadline(ctx: &FiringCtx) -> Duration {
    ctx.deps.config.conductor.agent_deadline()
}

fn base_env(ctx: &FiringCtx, node_id: &str) -> Vec<(String, String)> {
    vec![
        ("TENANT_ID".to_string(), ctx.tenant.to_string()),
        ("NODE_ID".to_string(), node_id.to_string()),
        ("WORKSPACE_DIR".to_string(), ctx.workspace_dir.display().to_string()),
    ]
}

// ── Single ──────────────────────────────────────────────────────────────

async fn run_single(
    ctx: &FiringCtx,
    node: &NodeDef,
    prompt: &str,
    exec: &mut NodeExecution,
) -> Result<()> {
    let clock = SystemClock;
    let agent_id = validate(&node.id, IdKind::Agent)?.to_string();
    let run = ctx
        .deps
        .strategy
        .spawn_agent(AgentSpec {
            agent_id: agent_id.clone(),
            agent_type: node.config.agent_type.clone(),
            prompt: prompt.to_string(),
            workspace_dir: ctx.workspace_dir.clone(),
            env: base_env(ctx, &node.id),
            deadline: agent_deadline(ctx),
            cancel: ctx.cancel.clone(),
        })
        .await?;

    let parsed = parse_agent_output(&agent_id, &run.output, clock.utc());
    exec.agent_id = Some(agent_id);
    exec.session_id = run.session_id;
    exec.token_count = run.token_count;
    exec.findings = parsed.findings;
    exec.result_text = Some(run.output);
    Ok(())
}

// ── Parallel ────────────────────────────────────────────────────────────

async fn run_parallel(ctx: &FiringCtx, node: &NodeDef, exec: &mut NodeExecution) -> Result<()> {
    let clock = SystemClock;
    let fan_out = node.fan_out();
    let member_cancel = ctx.cancel.child_token();
    let mut members: tokio::task::JoinSet<(String, Result<String>)> = tokio::task::JoinSet::new();

    for shard in 1..=fan_out {
        let agent_id = validate(&format!("{}-p{}", node.id, shard), IdKind::Agent)?.to_string();
        let scope = json!({
            "context": ctx.context,
            "shard": shard,
            "shard_count": fan_out,
        });
        let prompt = render(&node.prompt_template, &scope);
        let spec = AgentSpec {
            agent_id: agent_id.clone(),
            agent_type: node.config.agent_type.clone(),
            prompt,
            workspace_dir: ctx.workspace_dir.clone(),
            env: base_env(ctx, &node.id),
            deadline: agent_deadline(ctx),
            cancel: member_cancel.clone(),
        };
        let strategy = ctx.deps.strategy.clone();
        members.spawn(async move {
            let output = strategy.spawn_agent(spec).await.map(|run| run.output);
            (agent_id, output)
        });
    }

    let mut outputs: Vec<(String, String)> = Vec::new();
    let mut failures: Vec<(String, String)> = Vec::new();
    while let Some(joined) = members.join_next().await {
        let (agent_id, outcome) = joined
            .map_err(|e| EngineError::Handler(format!("parallel member panicked: {e}")))?;
        match outcome {
            Ok(output) => outputs.push((agent_id, output)),
            Err(e) => {
                failures.push((agent_id, e.to_string()));
                if !node.config.best_effort {
                    // Cancel the remaining members cooperatively
                    member_cancel.cancel();
                }
            }
        }
    }

    if !failures.is_empty() && !node.config.best_effort {
        let summary: Vec<String> =
            failures.iter().map(|(id, msg)| format!("{id}: {msg}")).collect();
        return Err(EngineError::Handler(format!(
            "{} of {} shards failed: {}",
            failures.len(),
            fan_out,
            summary.join("; ")
        )));
    }

    let mut findings = Vec::new();
    let mut texts = Vec::new();
    for (agent_id, output) in &outputs {
        let parsed = parse_agent_output(agent_id, output, clock.utc());
        findings.extend(parsed.findings);
        texts.push(output.clone());
    }
    exec.agent_id = Some(node.id.clone());
    exec.findings = findings;
    exec.result_text = Some(texts.join("\n\n"));
    exec.result_json = Some(json!({
        "shards_completed": outputs.len(),
        "shards_failed": failures.len(),
    }));
    Ok(())
}

// ── Swarm ───────────────────────────────────────────────────────────────

async fn run_swarm(
    ctx: &FiringCtx,
    node: &NodeDef,
    base_prompt: &str,
    exec: &mut NodeExecution,
) -> Result<()> {
    let clock = SystemClock;
    let now = clock.utc();

    // Fresh blackboard, exclusive create
    let board_dir = ctx.workspace_dir.join("boards");
    let lock_ttl = Duration::from_secs(ctx.deps.config.board.lock_ttl_secs);
    let board = BoardStore::create(&board_dir, ctx.run_id, lock_ttl, now)?;
    let board_path = board.path().display().to_string();

    // Register every role before any agent starts
    let mut roles: Vec<(String, RoleDef)> = Vec::new();
    for role in &node.config.roles {
        let agent_id = validate(&format!("{}-{}", node.id, role.name), IdKind::Agent)?.to_string();
        let task = role.task.clone().unwrap_or_else(|| base_prompt.to_string());
        board.register_agent(&agent_id, &task, role.interests.clone(), now).await?;
        roles.push((agent_id, role.clone()));
    }

    // Tiered watcher rides along for the life of the swarm
    let watcher_cancel = ctx.cancel.child_token();
    let watcher_board = BoardStore::open(board.path(), lock_ttl);
    let watcher_config = ctx.deps.config.watcher.clone();
    let escalation_dir = ctx.deps.config.escalation_dir();
    let decisions = crate::decision_log::DecisionLog::new(ctx.deps.kv.clone(), ctx.tenant.clone());
    let run_id = ctx.run_id;
    let watcher_token = watcher_cancel.clone();
    let watcher = tokio::spawn(async move {
        let mut tier1 = Tier1Watcher::new(watcher_board, watcher_config.clone(), escalation_dir);
        let tier2_board = BoardStore::open(tier1.board_path(), lock_ttl);
        let tier2 = Tier2Handler::new(tier2_board, watcher_config, decisions, run_id);
        loop {
            match tier1.watch(&watcher_token).await {
                Ok(WatchExit::Done) | Ok(WatchExit::Cancelled) => break,
                Ok(WatchExit::Escalated(signal)) => {
                    if let Err(e) = tier2.handle(&signal).await {
                        tracing::warn!(error = %e, "tier-2 intervention failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "tier-1 watcher error");
                    break;
                }
            }
        }
    });

    // Fan the role agents out; they self-coordinate from here
    let mut members: tokio::task::JoinSet<(String, Result<String>)> = tokio::task::JoinSet::new();
    for (agent_id, role) in &roles {
        let prompt = swarm_prompt(base_prompt, &role.name, &board_path);
        let mut env = base_env(ctx, &node.id);
        env.push(("BOARD_PATH".to_string(), board_path.clone()));
        let spec = AgentSpec {
            agent_id: agent_id.clone(),
            agent_type: node.config.agent_type.clone(),
            prompt,
            workspace_dir: ctx.workspace_dir.clone(),
            env,
            deadline: agent_deadline(ctx),
            cancel: ctx.cancel.clone(),
        };
        let strategy = ctx.deps.strategy.clone();
        let heartbeat_board = BoardStore::open(board.path(), lock_ttl);
        let heartbeat_id = agent_id.clone();
        let agent_id = agent_id.clone();
        members.spawn(async move {
            // Heartbeat rides alongside the agent call so tier-1 sees the
            // agent as live while it thinks.
            let clock = SystemClock;
            let work = strategy.spawn_agent(spec);
            tokio::pin!(work);
            loop {
                tokio::select! {
                    outcome = &mut work => {
                        return (agent_id, outcome.map(|run| run.output));
                    }
                    _ = tokio::time::sleep(Duration::from_secs(30)) => {
                        let _ = heartbeat_board.heartbeat(&heartbeat_id, clock.utc()).await;
                    }
                }
            }
        });
    }

    let mut failed = 0usize;
    while let Some(joined) = members.join_next().await {
        let (agent_id, outcome) = joined
            .map_err(|e| EngineError::Handler(format!("swarm member panicked: {e}")))?;
        let now = clock.utc();
        match outcome {
            Ok(output) => {
                let parsed = parse_agent_output(&agent_id, &output, now);
                for finding in parsed.findings {
                    board.add_finding(finding, now).await?;
                }
                for question in parsed.questions {
                    board.add_question(&agent_id, &question, now).await?;
                }
                board.set_agent_state(&agent_id, hive_core::BoardAgentState::Completed, now).await?;
            }
            Err(e) => {
                failed += 1;
                board
                    .add_finding(
                        Finding::new(&agent_id, hive_core::FindingKind::Blocker, e.to_string(), now)
                            .importance(hive_core::Importance::High),
                        now,
                    )
                    .await?;
                board.set_agent_state(&agent_id, hive_core::BoardAgentState::Failed, now).await?;
            }
        }
    }

    // Swarm is over; stand the watcher down and aggregate
    watcher_cancel.cancel();
    let _ = watcher.await;

    if ctx.cancel.is_cancelled() {
        let _ = board.remove();
        return Err(EngineError::Cancelled);
    }

    let snapshot = board.snapshot()?;
    let findings = snapshot.findings.clone();
    let questions: Vec<String> = snapshot.questions.iter().map(|q| q.content.clone()).collect();
    exec.agent_id = Some(node.id.clone());
    exec.findings = findings;
    exec.result_json = Some(json!({
        "agents_completed": snapshot.count_in_state(hive_core::BoardAgentState::Completed),
        "agents_failed": snapshot.count_in_state(hive_core::BoardAgentState::Failed),
        "questions": questions,
    }));
    exec.result_text = Some(summarize_board(&snapshot));

    // Final cleanup pass: the board file is removed once aggregated
    board.remove()?;

    if failed == roles.len() {
        return Err(EngineError::Handler("every swarm agent failed".to_string()));
    }
    Ok(())
}

fn swarm_prompt(base: &str, role: &str, board_path: &str) -> String {
    format!(
        "{base}\n\n\
        ## Swarm coordination\n\
        You are the `{role}` agent of a cooperating swarm.\n\
        The shared blackboard lives at `{board_path}`.\n\
        Publish findings with `[fact] …`, `[hypothesis] …`, `[blocker] …` lines;\n\
        raise questions with `[question] …`. Claim files before editing them\n\
        and release your claims when done."
    )
}

fn summarize_board(board: &hive_core::Blackboard) -> String {
    let mut lines = Vec::new();
    for finding in &board.findings {
        lines.push(format!("[{}] {}", finding.kind, finding.content));
    }
    lines.join("\n")
}

#[cfg(test)]
#[path = "nodes_tests.rs"]
mod tests;
