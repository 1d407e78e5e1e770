// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blackboard store: the single-writer discipline around the shared
//! per-run JSON document.
//!
//! Writers take an exclusive lock file (create-or-fail) around each
//! read-modify-write; a heartbeat timestamp inside the lock lets a later
//! writer break the glass when the holder crashed. Readers snapshot the
//! document without the lock and tolerate mild staleness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hive_core::{
    Blackboard, BoardAgent, BoardAgentState, BoardQuestion, ChainId, ChainStatus, ClaimChain,
    Finding, RunId,
};

use crate::error::EngineError;
use crate::Result;

/// How long a writer waits for the lock before giving up.
const LOCK_WAIT: Duration = Duration::from_secs(10);
const LOCK_POLL: Duration = Duration::from_millis(50);

/// Outcome of a claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimResult {
    Claimed(ChainId),
    /// The chains blocking the requested files.
    Blocked(Vec<ChainId>),
}

#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    holder: String,
    acquired_at_ms: u64,
    heartbeat_at_ms: u64,
}

pub struct BoardStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_ttl: Duration,
    holder: String,
}

impl BoardStore {
    /// Create a fresh blackboard file. Exclusive: an existing file for the
    /// same run is a conflict, never silently reused.
    pub fn create(dir: &Path, run_id: RunId, lock_ttl: Duration, now: DateTime<Utc>) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| EngineError::io(dir.display().to_string(), e))?;
        let path = dir.join(format!("board-{}.json", run_id.suffix()));
        let board = Blackboard::new(run_id, now);
        let bytes = encode(&board)?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut file = options
            .open(&path)
            .map_err(|e| EngineError::io(path.display().to_string(), e))?;
        use std::io::Write;
        file.write_all(&bytes).map_err(|e| EngineError::io(path.display().to_string(), e))?;
        Ok(Self::open(path, lock_ttl))
    }

    /// Attach to an existing blackboard file (watcher, agents).
    pub fn open(path: impl Into<PathBuf>, lock_ttl: Duration) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self { path, lock_path, lock_ttl, holder: format!("writer-{}", nanoid::nanoid!(8)) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock-free snapshot. May trail the latest write by one cycle.
    pub fn snapshot(&self) -> Result<Blackboard> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| EngineError::io(self.path.display().to_string(), e))?;
        decode(&bytes, &self.path)
    }

    /// Delete the document and its lock. Tolerates an already-removed
    /// file so the final cleanup pass and the node executor cannot race
    /// each other into an error.
    pub fn remove(&self) -> Result<()> {
        let _ = std::fs::remove_file(&self.lock_path);
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::io(self.path.display().to_string(), e)),
        }
    }

    // ── Locking ─────────────────────────────────────────────────────────

    fn epoch_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn try_acquire(&self) -> Result<bool> {
        let record = LockRecord {
            holder: self.holder.clone(),
            acquired_at_ms: Self::epoch_ms(),
            heartbeat_at_ms: Self::epoch_ms(),
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| EngineError::Handler(format!("lock encode failed: {e}")))?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        match options.open(&self.lock_path) {
            Ok(mut file) => {
                use std::io::Write;
                file.write_all(&bytes)
                    .map_err(|e| EngineError::io(self.lock_path.display().to_string(), e))?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                self.break_glass_if_stale()?;
                Ok(false)
            }
            Err(e) => Err(EngineError::io(self.lock_path.display().to_string(), e)),
        }
    }

    /// Remove the lock when its holder stopped heartbeating past the TTL.
    fn break_glass_if_stale(&self) -> Result<()> {
        let Ok(bytes) = std::fs::read(&self.lock_path) else { return Ok(()) };
        let Ok(record) = serde_json::from_slice::<LockRecord>(&bytes) else {
            // Unreadable lock: treat as crashed holder
            let _ = std::fs::remove_file(&self.lock_path);
            return Ok(());
        };
        let age = Self::epoch_ms().saturating_sub(record.heartbeat_at_ms);
        if age > self.lock_ttl.as_millis() as u64 {
            tracing::warn!(
                holder = %record.holder,
                stale_ms = age,
                "breaking stale blackboard lock"
            );
            let _ = std::fs::remove_file(&self.lock_path);
        }
        Ok(())
    }

    fn release(&self) {
        let _ = std::fs::remove_file(&self.lock_path);
    }

    /// Read-modify-write under the lock. Expired chains are pruned before
    /// `mutate` runs; document invariants are checked before the write.
    pub async fn update<T>(
        &self,
        now: DateTime<Utc>,
        mutate: impl FnOnce(&mut Blackboard) -> Result<T>,
    ) -> Result<T> {
        let give_up = tokio::time::Instant::now() + LOCK_WAIT;
        loop {
            if self.try_acquire()? {
                break;
            }
            if tokio::time::Instant::now() >= give_up {
                return Err(EngineError::BoardLocked {
                    path: self.lock_path.display().to_string(),
                });
            }
            tokio::time::sleep(LOCK_POLL).await;
        }

        let result = (|| {
            let bytes = std::fs::read(&self.path)
                .map_err(|e| EngineError::io(self.path.display().to_string(), e))?;
            let mut board = decode(&bytes, &self.path)?;
            board.prune_expired(now);
            let value = mutate(&mut board)?;
            board.check_invariants(now).map_err(EngineError::BoardInvariant)?;
            let bytes = encode(&board)?;
            let tmp = self.path.with_extension(format!("tmp.{}", nanoid::nanoid!(6)));
            std::fs::write(&tmp, bytes).map_err(|e| EngineError::io(tmp.display().to_string(), e))?;
            std::fs::rename(&tmp, &self.path)
                .map_err(|e| EngineError::io(self.path.display().to_string(), e))?;
            Ok(value)
        })();
        self.release();
        result
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Idempotent by agent id: re-registration refreshes the heartbeat but
    /// never duplicates the entry or resets the cursor.
    pub async fn register_agent(
        &self,
        agent_id: &str,
        task: &str,
        interests: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let agent_id = agent_id.to_string();
        let task = task.to_string();
        self.update(now, move |board| {
            board
                .agents
                .entry(agent_id)
                .and_modify(|agent| agent.heartbeat_at = now)
                .or_insert(BoardAgent {
                    task,
                    state: BoardAgentState::Active,
                    heartbeat_at: now,
                    interests,
                    cursor: 0,
                });
            Ok(())
        })
        .await
    }

    pub async fn heartbeat(&self, agent_id: &str, now: DateTime<Utc>) -> Result<()> {
        let agent_id = agent_id.to_string();
        self.update(now, move |board| {
            if let Some(agent) = board.agents.get_mut(&agent_id) {
                agent.heartbeat_at = now;
                if agent.state == BoardAgentState::Stale {
                    agent.state = BoardAgentState::Active;
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn set_agent_state(
        &self,
        agent_id: &str,
        state: BoardAgentState,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let agent_id = agent_id.to_string();
        self.update(now, move |board| {
            if let Some(agent) = board.agents.get_mut(&agent_id) {
                agent.state = state;
                agent.heartbeat_at = now;
            }
            Ok(())
        })
        .await
    }

    /// Append-only.
    pub async fn add_finding(&self, finding: Finding, now: DateTime<Utc>) -> Result<()> {
        self.update(now, move |board| {
            board.findings.push(finding);
            Ok(())
        })
        .await
    }

    pub async fn add_question(&self, agent_id: &str, content: &str, now: DateTime<Utc>) -> Result<()> {
        let question = BoardQuestion {
            agent_id: agent_id.to_string(),
            content: content.to_string(),
            created_at: now,
        };
        self.update(now, move |board| {
            board.questions.push(question);
            Ok(())
        })
        .await
    }

    /// Findings added since this agent's cursor; advances the cursor.
    pub async fn read_delta(&self, agent_id: &str, now: DateTime<Utc>) -> Result<Vec<Finding>> {
        let agent_id = agent_id.to_string();
        self.update(now, move |board| {
            let cursor = board.agents.get(&agent_id).map(|a| a.cursor).unwrap_or(0);
            let delta: Vec<Finding> = board.findings.get(cursor..).unwrap_or_default().to_vec();
            if let Some(agent) = board.agents.get_mut(&agent_id) {
                agent.cursor = board.findings.len();
            }
            Ok(delta)
        })
        .await
    }

    /// All-or-nothing file reservation. On overlap with any active chain,
    /// nothing is written and the blocking chains come back.
    pub async fn claim_chain(
        &self,
        agent_id: &str,
        files: Vec<String>,
        reason: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ClaimResult> {
        let agent_id = agent_id.to_string();
        let reason = reason.to_string();
        self.update(now, move |board| {
            let conflicts = board.conflicting_chains(&files, now);
            if !conflicts.is_empty() {
                return Ok(ClaimResult::Blocked(conflicts));
            }
            let chain_id = ChainId::new();
            board.claim_chains.insert(
                chain_id,
                ClaimChain {
                    agent_id,
                    files,
                    reason,
                    claimed_at: now,
                    expires_at: now + chrono::Duration::milliseconds(ttl.as_millis() as i64),
                    status: ChainStatus::Active,
                },
            );
            Ok(ClaimResult::Claimed(chain_id))
        })
        .await
    }

    pub async fn release_chain(&self, agent_id: &str, chain_id: ChainId, now: DateTime<Utc>) -> Result<()> {
        self.finish_chain(agent_id, chain_id, ChainStatus::Released, now).await
    }

    pub async fn complete_chain(&self, agent_id: &str, chain_id: ChainId, now: DateTime<Utc>) -> Result<()> {
        self.finish_chain(agent_id, chain_id, ChainStatus::Completed, now).await
    }

    async fn finish_chain(
        &self,
        agent_id: &str,
        chain_id: ChainId,
        status: ChainStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let agent_id = agent_id.to_string();
        self.update(now, move |board| {
            let Some(chain) = board.claim_chains.get_mut(&chain_id) else {
                return Err(EngineError::Handler(format!("chain {chain_id} not found")));
            };
            if chain.agent_id != agent_id {
                return Err(EngineError::Handler(format!(
                    "chain {chain_id} belongs to {}, not {agent_id}",
                    chain.agent_id
                )));
            }
            if chain.status == ChainStatus::Active {
                chain.status = status;
            }
            Ok(())
        })
        .await
    }
}

fn encode(board: &Blackboard) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(board)
        .map_err(|e| EngineError::Handler(format!("board encode failed: {e}")))
}

fn decode(bytes: &[u8], path: &Path) -> Result<Blackboard> {
    serde_json::from_slice(bytes)
        .map_err(|e| EngineError::BoardInvariant(format!("{} failed to parse: {e}", path.display())))
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod tests;
