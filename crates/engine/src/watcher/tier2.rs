// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tier-2: the escalation handler.
//!
//! Activated only when a tier-1 signal file exists. Chooses exactly one
//! action from a bounded set, executes it by mutating the blackboard,
//! writes an audit record, and archives the signal so tier-1 resumes.
//!
//! Decision heuristics, in priority order:
//! stuck/timeout → restart; failure with partial outputs → synthesize;
//! failure without outputs → reassign; failed-agent threshold exceeded →
//! abort; conflict/deadlock wording → escalate_human; default → synthesize.

use serde_json::json;

use hive_core::clock::Clock;
use hive_core::config::WatcherConfig;
use hive_core::{
    Blackboard, BoardAgentState, BoardTask, ConductorDecision, DecisionKind, RunId, SystemClock,
};

use crate::board::BoardStore;
use crate::decision_log::DecisionLog;
use crate::Result;

use super::{EscalationReason, EscalationSignal};

/// The bounded tier-2 action set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier2Action {
    Reassign,
    Restart,
    Abort,
    Synthesize,
    EscalateHuman,
}

hive_core::simple_display! {
    Tier2Action {
        Reassign => "reassign",
        Restart => "restart",
        Abort => "abort",
        Synthesize => "synthesize",
        EscalateHuman => "escalate_human",
    }
}

pub struct Tier2Handler {
    board: BoardStore,
    config: WatcherConfig,
    decisions: DecisionLog,
    run_id: RunId,
    clock: SystemClock,
}

impl Tier2Handler {
    pub fn new(
        board: BoardStore,
        config: WatcherConfig,
        decisions: DecisionLog,
        run_id: RunId,
    ) -> Self {
        Self { board, config, decisions, run_id, clock: SystemClock }
    }

    /// Pure decision over the signal and a board snapshot.
    pub fn decide(&self, signal: &EscalationSignal, board: &Blackboard) -> Tier2Action {
        let failed: Vec<&str> = board
            .agents
            .iter()
            .filter(|(_, a)| a.state == BoardAgentState::Failed)
            .map(|(id, _)| id.as_str())
            .collect();
        let failed_with_output = failed
            .iter()
            .any(|id| board.findings.iter().any(|f| f.agent_id == **id));

        if signal.reason == EscalationReason::StaleAgents && !signal.stale_agents.is_empty() {
            return Tier2Action::Restart;
        }
        if !failed.is_empty() && failed_with_output {
            return Tier2Action::Synthesize;
        }
        if !failed.is_empty() && failed.len() < self.config.max_failed_agents {
            return Tier2Action::Reassign;
        }
        if failed.len() >= self.config.max_failed_agents {
            return Tier2Action::Abort;
        }
        let wording = signal.error_excerpts.join(" ").to_ascii_lowercase();
        if wording.contains("conflict") || wording.contains("deadlock") || wording.contains("ambiguous")
        {
            return Tier2Action::EscalateHuman;
        }
        Tier2Action::Synthesize
    }

    /// Read the signal plus full context, pick one action, execute it,
    /// record it, and archive the signal.
    pub async fn handle(&self, signal: &EscalationSignal) -> Result<Tier2Action> {
        let now = self.clock.utc();
        let snapshot = self.board.snapshot()?;
        let action = self.decide(signal, &snapshot);
        tracing::info!(
            escalation = %signal.id,
            reason = %signal.reason,
            action = %action,
            "tier-2 intervention"
        );

        match action {
            Tier2Action::Restart => {
                // Stale agents get a fresh heartbeat and go back to work
                for agent_id in &signal.stale_agents {
                    self.board
                        .set_agent_state(agent_id, BoardAgentState::Active, now)
                        .await?;
                }
            }
            Tier2Action::Reassign => {
                let failed: Vec<(String, String)> = snapshot
                    .agents
                    .iter()
                    .filter(|(_, a)| a.state == BoardAgentState::Failed)
                    .map(|(id, a)| (id.clone(), a.task.clone()))
                    .collect();
                for (agent_id, task) in failed {
                    let board_task = BoardTask {
                        id: format!("task-{}", nanoid::nanoid!(8, &hive_core::id::ID_ALPHABET)),
                        description: task,
                        claimed_by: None,
                        created_at: now,
                    };
                    self.board
                        .update(now, move |board| {
                            board.task_queue.push(board_task);
                            Ok(())
                        })
                        .await?;
                    tracing::info!(agent = %agent_id, "failed agent's task requeued");
                }
            }
            Tier2Action::Abort => {
                let active: Vec<String> = snapshot
                    .agents
                    .iter()
                    .filter(|(_, a)| {
                        matches!(a.state, BoardAgentState::Active | BoardAgentState::Stale)
                    })
                    .map(|(id, _)| id.clone())
                    .collect();
                for agent_id in active {
                    self.board.set_agent_state(&agent_id, BoardAgentState::Failed, now).await?;
                }
            }
            Tier2Action::Synthesize => {
                // Nothing to mutate: the node executor aggregates whatever
                // partial outputs exist once the swarm settles.
            }
            Tier2Action::EscalateHuman => {
                self.board.add_question("watcher", "human attention required", now).await?;
            }
        }

        let kind = match action {
            Tier2Action::Restart | Tier2Action::Reassign => DecisionKind::Retry,
            Tier2Action::Abort => DecisionKind::Abort,
            Tier2Action::Synthesize | Tier2Action::EscalateHuman => DecisionKind::PhaseChange,
        };
        self.decisions
            .append(ConductorDecision::new(
                self.run_id,
                kind,
                json!({
                    "action": action.to_string(),
                    "escalation_id": signal.id,
                    "reason": signal.reason.to_string(),
                    "stale_agents": signal.stale_agents,
                }),
                "tier-2 intervention",
                now,
            ))
            .await?;

        signal.archive()?;
        Ok(action)
    }
}

#[cfg(test)]
#[path = "tier2_tests.rs"]
mod tests;
