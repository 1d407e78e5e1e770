// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tier-1: the cheap polling loop.
//!
//! Simple rules over a board snapshot, no model calls, and by contract
//! no mutation of agent state. Its only writes are the one-line log, the
//! escalation signal, and the final board cleanup on completion.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use hive_core::clock::Clock;
use hive_core::config::WatcherConfig;
use hive_core::SystemClock;

use crate::board::BoardStore;
use crate::Result;

use super::{EscalationReason, EscalationSignal};

/// Substrings in new findings/messages that count as error sightings.
const ERROR_KEYWORDS: [&str; 5] = ["error", "panic", "fatal", "exception", "unauthorized"];

/// How many one-line log records tier-1 keeps for the signal tail.
const LOG_KEEP: usize = 50;

/// The bounded tier-1 decision set.
#[derive(Debug, Clone, PartialEq)]
pub enum Tier1Decision {
    /// Healthy; keep polling.
    Nominal,
    /// No activity, but no error either; keep polling.
    Warning,
    /// Escalate to tier-2.
    InterventionNeeded(EscalationReason),
    /// All agents done, no open tasks; clean up and stop.
    Complete,
}

/// Why `watch` returned.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchExit {
    Done,
    Escalated(EscalationSignal),
    Cancelled,
}

pub struct Tier1Watcher {
    board: BoardStore,
    config: WatcherConfig,
    escalation_dir: PathBuf,
    log: VecDeque<String>,
    seen_findings: usize,
    idle_polls: u32,
    clock: SystemClock,
}

impl Tier1Watcher {
    pub fn new(board: BoardStore, config: WatcherConfig, escalation_dir: PathBuf) -> Self {
        Self {
            board,
            config,
            escalation_dir,
            log: VecDeque::new(),
            seen_findings: 0,
            idle_polls: 0,
            clock: SystemClock,
        }
    }

    pub fn board_path(&self) -> &Path {
        self.board.path()
    }

    fn signal_path(&self) -> PathBuf {
        let stem = self
            .board
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "board".to_string());
        self.escalation_dir.join(format!("{stem}.signal"))
    }

    fn log_line(&mut self, line: String) {
        tracing::info!(target: "hive::watcher", "{line}");
        self.log.push_back(line);
        while self.log.len() > LOG_KEEP {
            self.log.pop_front();
        }
    }

    fn log_tail(&self) -> Vec<String> {
        self.log
            .iter()
            .rev()
            .take(self.config.log_tail_lines)
            .rev()
            .cloned()
            .collect()
    }

    /// One polling pass over the board snapshot.
    pub fn poll_once(&mut self, now: DateTime<Utc>) -> Result<Tier1Decision> {
        let board = self.board.snapshot()?;
        let active = board.count_in_state(hive_core::BoardAgentState::Active);
        let completed = board.count_in_state(hive_core::BoardAgentState::Completed);
        let stale: Vec<String> = board
            .stale_agents(now, self.config.heartbeat_timeout())
            .into_iter()
            .map(str::to_string)
            .collect();

        // Only findings that arrived since the previous poll count as
        // activity or as fresh error sightings.
        let new_findings = board.findings.get(self.seen_findings..).unwrap_or_default();
        let errors: Vec<String> = new_findings
            .iter()
            .filter(|f| {
                let content = f.content.to_ascii_lowercase();
                ERROR_KEYWORDS.iter().any(|k| content.contains(k))
            })
            .map(|f| format!("[{}] {}: {}", f.kind, f.agent_id, f.content))
            .collect();
        let had_activity = !new_findings.is_empty();
        self.seen_findings = board.findings.len();

        self.log_line(format!(
            "{} active={} completed={} stale={} new_findings={} errors={}",
            now.to_rfc3339(),
            active,
            completed,
            stale.len(),
            new_findings.len(),
            errors.len(),
        ));

        if board.is_complete() {
            return Ok(Tier1Decision::Complete);
        }
        if !stale.is_empty() {
            return Ok(Tier1Decision::InterventionNeeded(EscalationReason::StaleAgents));
        }
        if !errors.is_empty() {
            return Ok(Tier1Decision::InterventionNeeded(EscalationReason::Errors));
        }
        if had_activity {
            self.idle_polls = 0;
            Ok(Tier1Decision::Nominal)
        } else {
            self.idle_polls += 1;
            // A long silence with live heartbeats is a warning, not an
            // intervention, until it isn't.
            if self.idle_polls >= 10 {
                self.idle_polls = 0;
                return Ok(Tier1Decision::InterventionNeeded(EscalationReason::NoProgress));
            }
            Ok(Tier1Decision::Warning)
        }
    }

    /// Poll until done, escalated, or cancelled.
    ///
    /// While a signal file exists the watcher holds its breath: tier-2
    /// owns the run until the signal is archived.
    pub async fn watch(&mut self, cancel: &CancellationToken) -> Result<WatchExit> {
        loop {
            if cancel.is_cancelled() {
                return Ok(WatchExit::Cancelled);
            }
            if self.signal_path().exists() {
                self.sleep(cancel).await;
                continue;
            }
            let now = self.clock.utc();
            match self.poll_once(now)? {
                Tier1Decision::Complete => {
                    return Ok(WatchExit::Done);
                }
                Tier1Decision::InterventionNeeded(reason) => {
                    let board = self.board.snapshot()?;
                    let stale: Vec<String> = board
                        .stale_agents(now, self.config.heartbeat_timeout())
                        .into_iter()
                        .map(str::to_string)
                        .collect();
                    let errors: Vec<String> = board
                        .findings
                        .iter()
                        .rev()
                        .take(5)
                        .map(|f| format!("[{}] {}", f.kind, f.content))
                        .collect();
                    let signal = EscalationSignal::new(
                        reason,
                        stale,
                        errors,
                        self.log_tail(),
                        now,
                        self.signal_path(),
                    );
                    signal.write()?;
                    return Ok(WatchExit::Escalated(signal));
                }
                Tier1Decision::Nominal | Tier1Decision::Warning => {
                    self.sleep(cancel).await;
                }
            }
        }
    }

    /// The final cleanup pass: delete the board once its findings have
    /// been aggregated. Callers invoke this after `watch` returns `Done`.
    pub fn cleanup(&self) -> Result<()> {
        self.board.remove()
    }

    async fn sleep(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.config.poll_interval()) => {}
        }
    }
}

#[cfg(test)]
#[path = "tier1_tests.rs"]
mod tests;
