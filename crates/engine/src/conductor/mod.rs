// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The conductor: walks a workflow DAG and fires nodes.
//!
//! One conductor instance runs inside the worker that claimed a `workflow`
//! job. It keeps a ready-set of nodes whose predecessors have settled,
//! fires up to the per-run concurrency bound, and merges node output back
//! into the run context (findings append, scalars last-writer-wins, file
//! sets union).
//!
//! When a node settles, its outgoing edges are evaluated against the
//! post-merge context and only the lowest-priority truthy tier carries
//! execution: a truthy edge with a higher priority number does not fire
//! while a lower-priority truthy edge exists on the same node. Equal
//! priorities within the winning tier all fire. Targets of losing or
//! false edges still settle, as skipped.

pub mod nodes;

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use hive_adapters::KvStore;
use hive_core::clock::Clock;
use hive_core::{
    Config, ConductorDecision, DecisionKind, NodeExecution, NodeStatus, RunId, RunStatus,
    SystemClock, TenantId, WorkflowRun,
};
use hive_storage::{Knowledge, TenantMemory, TrailLedger};
use hive_workflow::{eval_condition, parse_condition, Condition, WorkflowDef, END, START};

use crate::decision_log::DecisionLog;
use crate::error::EngineError;
use crate::strategy::ExecutorStrategy;
use crate::Result;

/// Everything the conductor and its node executors need. Knowledge and
/// trails are reached through the per-tenant partition, never directly.
#[derive(Clone)]
pub struct ConductorDeps {
    pub kv: Arc<dyn KvStore>,
    pub strategy: Arc<dyn ExecutorStrategy>,
    pub memory: Arc<TenantMemory>,
    pub config: Arc<Config>,
}

/// A cached node result, keyed tenant-wide by prompt hash.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CachedResult {
    result_text: Option<String>,
    result_json: Option<Value>,
    findings: Vec<hive_core::Finding>,
    files_modified: Vec<String>,
}

pub struct Conductor {
    deps: ConductorDeps,
    tenant: TenantId,
    /// This tenant's knowledge partition.
    knowledge: Arc<dyn Knowledge>,
    /// This tenant's trail ledger.
    trails: Arc<TrailLedger>,
    decisions: DecisionLog,
    clock: SystemClock,
}

impl Conductor {
    pub fn new(deps: ConductorDeps, tenant: TenantId) -> Result<Self> {
        let knowledge = deps.memory.knowledge(&tenant)?;
        let trails = deps.memory.trails(&tenant)?;
        let decisions = DecisionLog::new(deps.kv.clone(), tenant.clone());
        Ok(Self { deps, tenant, knowledge, trails, decisions, clock: SystemClock })
    }

    pub fn decision_log(&self) -> &DecisionLog {
        &self.decisions
    }

    fn runs_scope(&self) -> String {
        format!("runs/{}", self.tenant)
    }

    fn execs_scope(&self) -> String {
        format!("nodeexecs/{}", self.tenant)
    }

    fn cache_scope(&self) -> String {
        format!("promptcache/{}", self.tenant)
    }

    async fn save_run(&self, run: &WorkflowRun) -> Result<()> {
        let value = serde_json::to_value(run)
            .map_err(|e| EngineError::Handler(format!("run encode failed: {e}")))?;
        self.deps.kv.put(&self.runs_scope(), run.id.as_str(), value, None).await?;
        Ok(())
    }

    pub async fn load_run(&self, run_id: &RunId) -> Result<Option<WorkflowRun>> {
        let Some(versioned) = self.deps.kv.get(&self.runs_scope(), run_id.as_str()).await? else {
            return Ok(None);
        };
        serde_json::from_value(versioned.value)
            .map(Some)
            .map_err(|e| EngineError::Handler(format!("run decode failed: {e}")))
    }

    async fn save_exec(&self, exec: &NodeExecution) -> Result<()> {
        let value = serde_json::to_value(exec)
            .map_err(|e| EngineError::Handler(format!("exec encode failed: {e}")))?;
        self.deps.kv.put(&self.execs_scope(), exec.id.as_str(), value, None).await?;
        Ok(())
    }

    async fn cache_lookup(&self, prompt_hash: &str) -> Result<Option<CachedResult>> {
        let Some(versioned) = self.deps.kv.get(&self.cache_scope(), prompt_hash).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_value(versioned.value).ok())
    }

    async fn cache_store(&self, prompt_hash: &str, cached: &CachedResult) -> Result<()> {
        let value = serde_json::to_value(cached)
            .map_err(|e| EngineError::Handler(format!("cache encode failed: {e}")))?;
        self.deps.kv.put(&self.cache_scope(), prompt_hash, value, None).await?;
        Ok(())
    }

    async fn decide(
        &self,
        run_id: RunId,
        kind: DecisionKind,
        data: Value,
        reason: &str,
    ) -> Result<()> {
        self.decisions
            .append(ConductorDecision::new(run_id, kind, data, reason, self.clock.utc()))
            .await
    }

    /// Execute one workflow to completion. `workspace_dir` is the owning
    /// job's scratch directory; `cancel` is the job-level token.
    pub async fn run_workflow(
        &self,
        def: &WorkflowDef,
        input: Value,
        workspace_dir: &std::path::Path,
        cancel: &CancellationToken,
    ) -> Result<WorkflowRun> {
        let now = self.clock.utc();
        let mut run = WorkflowRun::new(
            self.tenant.clone(),
            Some(def.name.clone()),
            input,
            def.nodes.len() as u32,
            now,
        );
        run.status = RunStatus::Running;
        run.phase = "running".to_string();
        self.save_run(&run).await?;
        self.decide(run.id, DecisionKind::PhaseChange, json!({"phase": "running"}), "run started")
            .await?;

        let outcome = self.drive(def, &mut run, workspace_dir, cancel).await;
        let now = self.clock.utc();

        match outcome {
            Ok(aborted) => {
                let status = if cancel.is_cancelled() {
                    RunStatus::Cancelled
                } else if aborted {
                    RunStatus::Failed
                } else {
                    RunStatus::Completed
                };
                let output = json!({
                    "findings": run.context.get("findings").cloned().unwrap_or(json!([])),
                    "files_modified": run.context.get("files_modified").cloned().unwrap_or(json!([])),
                    "completed_nodes": run.completed_nodes,
                    "failed_nodes": run.failed_nodes,
                });
                run.finish(status, Some(output), now);
            }
            Err(ref e) => {
                self.decide(run.id, DecisionKind::Abort, json!({"error": e.to_string()}), "run failed")
                    .await?;
                run.finish(RunStatus::Failed, None, now);
            }
        }
        self.save_run(&run).await?;
        self.trails.flush()?;
        match outcome {
            Ok(_) => Ok(run),
            Err(e) => Err(e),
        }
    }

    /// The ready-set loop. Returns true when the run aborted on a node
    /// failure that nothing tolerated.
    async fn drive(
        &self,
        def: &WorkflowDef,
        run: &mut WorkflowRun,
        workspace_dir: &std::path::Path,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let conditions = compile_conditions(def)?;
        let bound = self.deps.config.conductor.run_concurrency.max(1);
        let node_cancel = cancel.child_token();

        let mut ready: VecDeque<String> = VecDeque::new();
        let mut settled: HashMap<String, NodeStatus> = HashMap::new();
        let mut queued: HashSet<String> = HashSet::new();
        // Indexes into def.edges whose condition held AND whose priority
        // tier won at their source. A node fires only through these.
        let mut fired_edges: HashSet<usize> = HashSet::new();
        let mut retries: HashMap<String, u32> = HashMap::new();
        let mut executing: tokio::task::JoinSet<(String, Result<NodeExecution>)> =
            tokio::task::JoinSet::new();
        let mut aborting = false;
        let mut failed_abort = false;

        self.expand_outgoing(
            def,
            run,
            START,
            None,
            &conditions,
            &mut ready,
            &mut queued,
            &mut fired_edges,
            &settled,
        )
        .await?;

        loop {
            if cancel.is_cancelled() && !aborting {
                aborting = true;
                node_cancel.cancel();
                self.decide(run.id, DecisionKind::PhaseChange, json!({"phase": "cancelling"}), "run cancelled")
                    .await?;
            }

            // Fire everything fireable within the concurrency bound
            while executing.len() < bound && !aborting {
                let Some(node_id) = ready.pop_front() else { break };
                queued.remove(&node_id);
                if node_id == END || settled.contains_key(&node_id) {
                    continue;
                }
                if !predecessors_settled(def, &node_id, &settled) {
                    // The other branch of a join will re-queue this node
                    continue;
                }
                let Some(node) = def.node(&node_id) else { continue };

                if !has_fired_incoming(def, &node_id, &fired_edges) {
                    let exec = self.skipped_exec(run, node, "no incoming edge fired").await?;
                    settled.insert(node_id.clone(), exec.status);
                    self.expand_outgoing(
                        def,
                        run,
                        &node_id,
                        Some(NodeStatus::Skipped),
                        &conditions,
                        &mut ready,
                        &mut queued,
                        &mut fired_edges,
                        &settled,
                    )
                    .await?;
                    continue;
                }

                let retry_count = retries.get(&node_id).copied().unwrap_or(0);
                self.decide(
                    run.id,
                    DecisionKind::FireNode,
                    json!({"node_id": node_id, "retry_count": retry_count}),
                    "predecessors satisfied and an incoming edge fired",
                )
                .await?;

                let firing_ctx = nodes::FiringCtx {
                    deps: self.deps.clone(),
                    tenant: self.tenant.clone(),
                    knowledge: self.knowledge.clone(),
                    run_id: run.id,
                    context: run.context.clone(),
                    workspace_dir: workspace_dir.to_path_buf(),
                    cancel: node_cancel.clone(),
                    retry_count,
                };
                let node = node.clone();
                let conductor_cache = self.clone_for_cache();
                executing.spawn(async move {
                    let node_id = node.id.clone();
                    let result = nodes::fire(firing_ctx, node, conductor_cache).await;
                    (node_id, result)
                });
            }

            if executing.is_empty() {
                break;
            }

            // Wait for one firing to settle
            let Some(joined) = executing.join_next().await else { break };
            let (node_id, fired) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    return Err(EngineError::Handler(format!("node task panicked: {e}")));
                }
            };

            match fired {
                Ok(exec) => {
                    self.save_exec(&exec).await?;
                    self.knowledge.record_outcome(&exec, self.clock.utc()).await?;
                    match exec.status {
                        NodeStatus::Completed | NodeStatus::Skipped => {
                            if exec.status == NodeStatus::Completed {
                                run.completed_nodes += 1;
                            }
                            merge_context(&mut run.context, &exec);
                            self.leave_trails(run.id, &exec);
                            settled.insert(node_id.clone(), exec.status);
                            self.save_run(run).await?;
                            self.expand_outgoing(
                                def,
                                run,
                                &node_id,
                                Some(exec.status),
                                &conditions,
                                &mut ready,
                                &mut queued,
                                &mut fired_edges,
                                &settled,
                            )
                            .await?;
                        }
                        NodeStatus::Failed => {
                            run.failed_nodes += 1;
                            self.save_run(run).await?;
                            let node = def.node(&node_id);
                            let budget =
                                node.map(|n| n.config.retry_budget).unwrap_or_default();
                            let used = retries.get(&node_id).copied().unwrap_or(0);
                            if used < budget && !aborting {
                                retries.insert(node_id.clone(), used + 1);
                                self.decide(
                                    run.id,
                                    DecisionKind::Retry,
                                    json!({"node_id": node_id, "retry_count": used + 1}),
                                    "retry budget remains",
                                )
                                .await?;
                                if !queued.contains(&node_id) {
                                    ready.push_back(node_id.clone());
                                    queued.insert(node_id);
                                }
                            } else if has_failure_tolerant_edge(def, &node_id) {
                                settled.insert(node_id.clone(), NodeStatus::Failed);
                                self.decide(
                                    run.id,
                                    DecisionKind::PhaseChange,
                                    json!({"node_id": node_id}),
                                    "failure tolerated by outgoing edge",
                                )
                                .await?;
                                self.expand_outgoing(
                                    def,
                                    run,
                                    &node_id,
                                    Some(NodeStatus::Failed),
                                    &conditions,
                                    &mut ready,
                                    &mut queued,
                                    &mut fired_edges,
                                    &settled,
                                )
                                .await?;
                            } else {
                                aborting = true;
                                failed_abort = true;
                                node_cancel.cancel();
                                self.decide(
                                    run.id,
                                    DecisionKind::Abort,
                                    json!({"node_id": node_id}),
                                    "retry budget exhausted and no failure-tolerant edge",
                                )
                                .await?;
                                settled.insert(node_id, NodeStatus::Failed);
                            }
                        }
                        other => {
                            return Err(EngineError::Handler(format!(
                                "node {node_id} settled in non-terminal status {other}"
                            )));
                        }
                    }
                }
                Err(e) => {
                    // Infrastructure failure before the node could settle
                    run.failed_nodes += 1;
                    self.save_run(run).await?;
                    aborting = true;
                    failed_abort = true;
                    node_cancel.cancel();
                    self.decide(
                        run.id,
                        DecisionKind::Abort,
                        json!({"node_id": node_id, "error": e.to_string()}),
                        "node infrastructure failure",
                    )
                    .await?;
                    settled.insert(node_id, NodeStatus::Failed);
                }
            }
        }
        Ok(failed_abort)
    }

    /// Settle-time expansion of a node's outgoing edges.
    ///
    /// Each edge's condition is evaluated against the post-merge context
    /// (evaluation errors default the edge to false and log a skip). Among
    /// the truthy edges, only the lowest priority number fires; equal
    /// priorities within that tier all fire (the Cartesian expansion). A
    /// failed source carries execution only over `allow_failure` edges.
    /// Every target still enters the ready set so losers settle as
    /// skipped.
    #[allow(clippy::too_many_arguments)]
    async fn expand_outgoing(
        &self,
        def: &WorkflowDef,
        run: &WorkflowRun,
        source: &str,
        source_status: Option<NodeStatus>,
        conditions: &HashMap<usize, Condition>,
        ready: &mut VecDeque<String>,
        queued: &mut HashSet<String>,
        fired_edges: &mut HashSet<usize>,
        settled: &HashMap<String, NodeStatus>,
    ) -> Result<()> {
        let mut truthy: Vec<(usize, i32)> = Vec::new();
        for (index, edge) in def.edges.iter().enumerate() {
            if edge.from != source {
                continue;
            }
            if edge.to != END
                && !settled.contains_key(edge.to.as_str())
                && !queued.contains(edge.to.as_str())
            {
                ready.push_back(edge.to.clone());
                queued.insert(edge.to.clone());
            }
            if source_status == Some(NodeStatus::Failed) && !edge.allow_failure {
                continue;
            }
            let Some(condition) = conditions.get(&index) else { continue };
            match eval_condition(condition, &run.context) {
                Ok(true) => truthy.push((index, edge.priority)),
                Ok(false) => {}
                Err(e) => {
                    self.decide(
                        run.id,
                        DecisionKind::SkipNode,
                        json!({"node_id": edge.to, "edge": {"from": edge.from, "to": edge.to}}),
                        &format!("condition defaulted to false: {e}"),
                    )
                    .await?;
                }
            }
        }

        // Lowest priority number wins; only its ties fire
        if let Some(winning) = truthy.iter().map(|(_, priority)| *priority).min() {
            for (index, priority) in truthy {
                if priority == winning {
                    fired_edges.insert(index);
                }
            }
        }
        Ok(())
    }

    async fn skipped_exec(
        &self,
        run: &WorkflowRun,
        node: &hive_workflow::NodeDef,
        reason: &str,
    ) -> Result<NodeExecution> {
        let now = self.clock.utc();
        let mut exec = NodeExecution::new(
            run.id,
            &node.id,
            node.kind,
            String::new(),
            nodes::hash_prompt(""),
            now,
        );
        exec.status = NodeStatus::Skipped;
        self.save_exec(&exec).await?;
        self.decide(
            run.id,
            DecisionKind::SkipNode,
            json!({"node_id": node.id}),
            reason,
        )
        .await?;
        Ok(exec)
    }

    fn leave_trails(&self, run_id: RunId, exec: &NodeExecution) {
        use hive_core::{LocationKind, Scent, Trail};
        let now = self.clock.utc();
        for file in &exec.files_modified {
            self.trails.append(
                Trail::new(
                    file.clone(),
                    LocationKind::File,
                    Scent::Hot,
                    0.6,
                    exec.agent_id.clone().unwrap_or_else(|| exec.node_id.clone()),
                    format!("touched by node {}", exec.node_id),
                    now,
                )
                .run_id(run_id)
                .node_id(exec.node_id.clone()),
            );
        }
        for finding in &exec.findings {
            let scent = match finding.kind {
                hive_core::FindingKind::Blocker => Scent::Blocker,
                hive_core::FindingKind::Warning => Scent::Warning,
                _ => Scent::Discovery,
            };
            self.trails.append(
                Trail::new(
                    exec.node_id.clone(),
                    LocationKind::Concept,
                    scent,
                    0.5,
                    finding.agent_id.clone(),
                    finding.content.clone(),
                    now,
                )
                .run_id(run_id),
            );
        }
    }

    /// A trimmed handle for node tasks to reach the prompt cache.
    fn clone_for_cache(&self) -> CacheHandle {
        CacheHandle { kv: self.deps.kv.clone(), scope: self.cache_scope() }
    }
}

/// Prompt-hash result cache shared with node firings.
#[derive(Clone)]
pub(crate) struct CacheHandle {
    kv: Arc<dyn KvStore>,
    scope: String,
}

impl CacheHandle {
    pub(crate) async fn lookup(&self, prompt_hash: &str) -> Option<CachedResult> {
        let versioned = self.kv.get(&self.scope, prompt_hash).await.ok()??;
        serde_json::from_value(versioned.value).ok()
    }

    pub(crate) async fn store(&self, prompt_hash: &str, cached: &CachedResult) {
        if let Ok(value) = serde_json::to_value(cached) {
            let _ = self.kv.put(&self.scope, prompt_hash, value, None).await;
        }
    }
}

fn compile_conditions(def: &WorkflowDef) -> Result<HashMap<usize, Condition>> {
    let mut conditions = HashMap::new();
    for (index, edge) in def.edges.iter().enumerate() {
        conditions.insert(index, parse_condition(&edge.condition)?);
    }
    Ok(conditions)
}

/// All non-sentinel predecessors have settled.
fn predecessors_settled(
    def: &WorkflowDef,
    node_id: &str,
    settled: &HashMap<String, NodeStatus>,
) -> bool {
    def.edges_into(node_id)
        .iter()
        .all(|edge| edge.from == START || settled.contains_key(&edge.from))
}

/// At least one of the node's incoming edges fired at its source.
fn has_fired_incoming(def: &WorkflowDef, node_id: &str, fired_edges: &HashSet<usize>) -> bool {
    def.edges
        .iter()
        .enumerate()
        .any(|(index, edge)| edge.to == node_id && fired_edges.contains(&index))
}

fn has_failure_tolerant_edge(def: &WorkflowDef, node_id: &str) -> bool {
    def.edges.iter().any(|e| e.from == node_id && e.allow_failure)
}

/// The documented merge: findings append, file sets union, scalar keys
/// last-writer-wins. Reserved keys (`input`, `findings`, `files_modified`,
/// `nodes`) are never clobbered by node results.
fn merge_context(context: &mut Value, exec: &NodeExecution) {
    if !context.is_object() {
        *context = json!({});
    }

    // findings append
    if let Some(map) = context.as_object_mut() {
        let findings = map.entry("findings").or_insert_with(|| json!([]));
        if let Value::Array(list) = findings {
            for finding in &exec.findings {
                if let Ok(value) = serde_json::to_value(finding) {
                    list.push(value);
                }
            }
        }
    }

    // files_modified union
    if let Some(map) = context.as_object_mut() {
        let files = map.entry("files_modified").or_insert_with(|| json!([]));
        if let Value::Array(list) = files {
            for file in &exec.files_modified {
                let value = Value::String(file.clone());
                if !list.contains(&value) {
                    list.push(value);
                }
            }
        }
    }

    // per-node summary for edge conditions
    if let Some(map) = context.as_object_mut() {
        let nodes = map.entry("nodes").or_insert_with(|| json!({}));
        if let Some(nodes) = nodes.as_object_mut() {
            nodes.insert(
                exec.node_id.clone(),
                json!({
                    "status": exec.status,
                    "result_text": exec.result_text,
                }),
            );
        }
    }

    // scalar keys from result_json: last writer wins
    if let Some(result) = exec.result_json.as_ref().and_then(Value::as_object) {
        const RESERVED: [&str; 4] = ["input", "findings", "files_modified", "nodes"];
        if let Some(map) = context.as_object_mut() {
            for (key, value) in result {
                if RESERVED.contains(&key.as_str()) {
                    continue;
                }
                map.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "conductor_tests.rs"]
mod tests;
