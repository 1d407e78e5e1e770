// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tiered watcher.
//!
//! Tier-1 is a cheap polling loop with a bounded decision set; tier-2 is
//! the expensive intervention handler. The escalation signal file is the
//! only channel between them: created exclusively by tier-1, archived by
//! tier-2, and its absence is tier-1's clear-to-resume indication.

pub mod tier1;
pub mod tier2;

pub use tier1::{Tier1Decision, Tier1Watcher, WatchExit};
pub use tier2::{Tier2Action, Tier2Handler};

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::Result;

/// Why tier-1 escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationReason {
    StaleAgents,
    Errors,
    NoProgress,
}

hive_core::simple_display! {
    EscalationReason {
        StaleAgents => "stale_agents",
        Errors => "errors",
        NoProgress => "no_progress",
    }
}

impl std::str::FromStr for EscalationReason {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stale_agents" => Ok(EscalationReason::StaleAgents),
            "errors" => Ok(EscalationReason::Errors),
            "no_progress" => Ok(EscalationReason::NoProgress),
            other => Err(EngineError::Handler(format!("unknown escalation reason {other:?}"))),
        }
    }
}

/// The plain-text signal document. Present-on-disk IS the signal.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationSignal {
    pub id: String,
    pub reason: EscalationReason,
    pub created_at: DateTime<Utc>,
    pub stale_agents: Vec<String>,
    pub error_excerpts: Vec<String>,
    pub log_tail: Vec<String>,
    pub path: PathBuf,
}

impl EscalationSignal {
    pub fn new(
        reason: EscalationReason,
        stale_agents: Vec<String>,
        error_excerpts: Vec<String>,
        log_tail: Vec<String>,
        now: DateTime<Utc>,
        path: PathBuf,
    ) -> Self {
        Self {
            id: format!("esc-{}", nanoid::nanoid!(12, &hive_core::id::ID_ALPHABET)),
            reason,
            created_at: now,
            stale_agents,
            error_excerpts,
            log_tail,
            path,
        }
    }

    fn render(&self) -> String {
        let mut text = String::new();
        text.push_str(&format!("escalation: {}\n", self.id));
        text.push_str(&format!("reason: {}\n", self.reason));
        text.push_str(&format!("created_at: {}\n", self.created_at.to_rfc3339()));
        text.push_str(&format!("stale_agents: {}\n", self.stale_agents.join(",")));
        text.push_str("---- errors\n");
        for line in &self.error_excerpts {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str("---- log\n");
        for line in &self.log_tail {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// Write the signal exclusively. Fails when one already exists, so
    /// tier-2 never races a second escalation.
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::io(parent.display().to_string(), e))?;
        }
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut file = options
            .open(&self.path)
            .map_err(|e| EngineError::io(self.path.display().to_string(), e))?;
        use std::io::Write;
        file.write_all(self.render().as_bytes())
            .map_err(|e| EngineError::io(self.path.display().to_string(), e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::io(path.display().to_string(), e))?;
        Self::parse(&text, path.to_path_buf())
    }

    fn parse(text: &str, path: PathBuf) -> Result<Self> {
        let mut id = String::new();
        let mut reason = EscalationReason::NoProgress;
        let mut created_at = DateTime::<Utc>::MIN_UTC;
        let mut stale_agents = Vec::new();
        let mut error_excerpts = Vec::new();
        let mut log_tail = Vec::new();
        let mut section = "";
        for line in text.lines() {
            match line {
                "---- errors" => {
                    section = "errors";
                    continue;
                }
                "---- log" => {
                    section = "log";
                    continue;
                }
                _ => {}
            }
            match section {
                "errors" => error_excerpts.push(line.to_string()),
                "log" => log_tail.push(line.to_string()),
                _ => {
                    if let Some(value) = line.strip_prefix("escalation: ") {
                        id = value.to_string();
                    } else if let Some(value) = line.strip_prefix("reason: ") {
                        reason = value.parse()?;
                    } else if let Some(value) = line.strip_prefix("created_at: ") {
                        created_at = DateTime::parse_from_rfc3339(value)
                            .map_err(|e| EngineError::Handler(format!("bad signal timestamp: {e}")))?
                            .with_timezone(&Utc);
                    } else if let Some(value) = line.strip_prefix("stale_agents: ") {
                        stale_agents = value
                            .split(',')
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect();
                    }
                }
            }
        }
        if id.is_empty() {
            return Err(EngineError::Handler("signal file missing escalation id".to_string()));
        }
        Ok(Self { id, reason, created_at, stale_agents, error_excerpts, log_tail, path })
    }

    /// Move the consumed signal into the archive; its disappearance is
    /// what lets tier-1 resume.
    pub fn archive(&self) -> Result<()> {
        let archive_dir = self
            .path
            .parent()
            .map(|p| p.join("archive"))
            .unwrap_or_else(|| PathBuf::from("archive"));
        std::fs::create_dir_all(&archive_dir)
            .map_err(|e| EngineError::io(archive_dir.display().to_string(), e))?;
        let target = archive_dir.join(format!("{}.signal", self.id));
        std::fs::rename(&self.path, &target)
            .map_err(|e| EngineError::io(target.display().to_string(), e))
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
