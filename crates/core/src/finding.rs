// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured agent findings and the line-prefix output convention.
//!
//! Agents emit free text; lines prefixed `[fact]`, `[hypothesis]`,
//! `[blocker]`, or `[question]` are lifted into structured records. The
//! same `Finding` shape is shared by node results and the blackboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of an agent-emitted observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Discovery,
    Warning,
    Decision,
    Blocker,
    Fact,
    Hypothesis,
}

crate::simple_display! {
    FindingKind {
        Discovery => "discovery",
        Warning => "warning",
        Decision => "decision",
        Blocker => "blocker",
        Fact => "fact",
        Hypothesis => "hypothesis",
    }
}

/// How much a finding should weigh in aggregation and escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

crate::simple_display! {
    Importance {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl Default for Importance {
    fn default() -> Self {
        Importance::Medium
    }
}

/// A structured agent observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub agent_id: String,
    pub kind: FindingKind,
    pub content: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        agent_id: impl Into<String>,
        kind: FindingKind,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("fnd-{}", nanoid::nanoid!(12)),
            agent_id: agent_id.into(),
            kind,
            content: content.into(),
            files: Vec::new(),
            importance: Importance::default(),
            tags: Vec::new(),
            created_at: now,
        }
    }

    crate::setters! {
        set {
            files: Vec<String>,
            importance: Importance,
            tags: Vec<String>,
        }
    }
}

/// Result of scanning raw agent output for prefixed lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub findings: Vec<Finding>,
    /// `[question]` lines; routed to the blackboard question list, not to
    /// the findings stream.
    pub questions: Vec<String>,
}

/// Scan agent output for the line-prefix convention.
///
/// Unknown prefixes and unprefixed lines are ignored; the full text is kept
/// separately as `result_text`.
pub fn parse_agent_output(agent_id: &str, text: &str, now: DateTime<Utc>) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    for line in text.lines() {
        let line = line.trim();
        let Some((prefix, rest)) = split_prefix(line) else {
            continue;
        };
        let content = rest.trim();
        if content.is_empty() {
            continue;
        }
        match prefix {
            "fact" => out.findings.push(Finding::new(agent_id, FindingKind::Fact, content, now)),
            "hypothesis" => {
                out.findings.push(Finding::new(agent_id, FindingKind::Hypothesis, content, now))
            }
            "blocker" => out.findings.push(
                Finding::new(agent_id, FindingKind::Blocker, content, now)
                    .importance(Importance::High),
            ),
            "question" => out.questions.push(content.to_string()),
            _ => {}
        }
    }
    out
}

fn split_prefix(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('[')?;
    let end = rest.find(']')?;
    Some((&rest[..end], &rest[end + 1..]))
}

#[cfg(test)]
#[path = "finding_tests.rs"]
mod tests;
