// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Knowledge store: rules, heuristics, and past failures injected into
//! agent prompts.
//!
//! Golden rules (validation count past the threshold) are always included.
//! Other heuristics are scored by recency, domain match, and validation
//! count; similar past failures are matched by Jaccard keyword overlap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use hive_core::{NodeExecution, NodeStatus};

use crate::error::StorageError;
use crate::Result;

/// Validation count at which a heuristic becomes a golden rule.
pub const GOLDEN_THRESHOLD: u32 = 20;

/// Heuristics surfaced per query.
const TOP_K_HEURISTICS: usize = 5;

/// Past failures surfaced per query.
const TOP_K_FAILURES: usize = 5;

/// Jaccard similarity threshold for "similar failure".
const SIMILARITY_THRESHOLD: f64 = 0.30;

/// Only failures from the last 30 days are matched.
const FAILURE_WINDOW_DAYS: i64 = 30;

/// Minimum keyword length for similarity matching.
const MIN_KEYWORD_LEN: usize = 4;

/// Recency decay floor for heuristic scoring.
const RECENCY_FLOOR: f64 = 0.25;

const DOMAIN_BOOST: f64 = 1.5;

/// Problem domain a heuristic applies to. A closed set: unknown domains
/// are rejected at ingress rather than silently accepted as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Api,
    Storage,
    Concurrency,
    Ui,
    Infra,
    General,
}

hive_core::simple_display! {
    Domain {
        Api => "api",
        Storage => "storage",
        Concurrency => "concurrency",
        Ui => "ui",
        Infra => "infra",
        General => "general",
    }
}

impl FromStr for Domain {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "api" => Ok(Domain::Api),
            "storage" => Ok(Domain::Storage),
            "concurrency" => Ok(Domain::Concurrency),
            "ui" => Ok(Domain::Ui),
            "infra" => Ok(Domain::Infra),
            "general" => Ok(Domain::General),
            other => Err(StorageError::UnknownDomain { domain: other.to_string() }),
        }
    }
}

/// A learned heuristic. Golden once `validation_count >= GOLDEN_THRESHOLD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heuristic {
    pub id: String,
    pub text: String,
    /// Base relevance in [0, 1] assigned when the heuristic was recorded.
    pub base: f64,
    pub domain: Domain,
    pub validation_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl Heuristic {
    pub fn is_golden(&self) -> bool {
        self.validation_count >= GOLDEN_THRESHOLD
    }

    /// `base * recency_decay * domain_boost * validation_boost`, capped at 1.
    fn relevance(&self, query_domain: Option<Domain>, now: DateTime<Utc>) -> f64 {
        let age_days =
            ((now - self.updated_at).num_milliseconds().max(0) as f64) / (24.0 * 3600.0 * 1000.0);
        let recency = 0.5f64.powf(age_days / 7.0).max(RECENCY_FLOOR);
        let domain = if query_domain == Some(self.domain) { DOMAIN_BOOST } else { 1.0 };
        let validation = if self.validation_count >= 10 {
            1.4
        } else if self.validation_count >= 5 {
            1.2
        } else {
            1.0
        };
        (self.base * recency * domain * validation).min(1.0)
    }
}

/// A recorded failure for similarity matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastFailure {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

impl PastFailure {
    fn keywords(&self) -> HashSet<String> {
        keywords(&format!("{} {}", self.title, self.summary))
    }
}

/// Keywords: lowercase alphanumeric words of at least four characters.
fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() >= MIN_KEYWORD_LEN)
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// A query for prompt context.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeQuery {
    pub task_text: String,
    pub domain: Option<Domain>,
    pub tags: Vec<String>,
    /// Budget for the stitched context, in characters.
    pub max_chars: usize,
}

impl KnowledgeQuery {
    pub fn new(task_text: impl Into<String>) -> Self {
        Self { task_text: task_text.into(), domain: None, tags: Vec::new(), max_chars: 4_000 }
    }
}

/// The interface the node executors consume.
#[async_trait]
pub trait Knowledge: Send + Sync {
    /// Context text to stitch above the node-specific instructions.
    /// Empty when nothing relevant is known.
    async fn query(&self, query: &KnowledgeQuery, now: DateTime<Utc>) -> Result<String>;

    /// Record the outcome of a node execution for future queries.
    async fn record_outcome(&self, exec: &NodeExecution, now: DateTime<Utc>) -> Result<()>;
}

// ── File-backed implementation ──────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct KnowledgeFile {
    #[serde(default)]
    heuristics: Vec<Heuristic>,
    #[serde(default)]
    failures: Vec<PastFailure>,
}

/// Single JSON document per tenant under `memory/<tenant>/knowledge.json`.
pub struct FileKnowledge {
    path: PathBuf,
    state: Mutex<KnowledgeFile>,
}

impl FileKnowledge {
    pub fn open(memory_dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = memory_dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        let path = dir.join("knowledge.json");
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::Decode { id: path.display().to_string(), source: e })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => KnowledgeFile::default(),
            Err(e) => return Err(StorageError::io(path.display().to_string(), e)),
        };
        Ok(Self { path, state: Mutex::new(state) })
    }

    fn save(&self, state: &KnowledgeFile) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| StorageError::Encode { id: self.path.display().to_string(), source: e })?;
        let tmp = self.path.with_extension(format!("tmp.{}", nanoid::nanoid!(6)));
        std::fs::write(&tmp, bytes).map_err(|e| StorageError::io(tmp.display().to_string(), e))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| StorageError::io(self.path.display().to_string(), e))
    }

    /// Seed or update a heuristic (operator/tooling entry point).
    pub fn upsert_heuristic(&self, heuristic: Heuristic) -> Result<()> {
        let mut state = self.state.lock();
        match state.heuristics.iter_mut().find(|h| h.id == heuristic.id) {
            Some(existing) => *existing = heuristic,
            None => state.heuristics.push(heuristic),
        }
        self.save(&state)
    }

    /// Similar failures: Jaccard over ≥4-char keywords, 30-day window,
    /// threshold 0.30, strongest five.
    fn similar_failures(&self, state: &KnowledgeFile, task_text: &str, now: DateTime<Utc>) -> Vec<(PastFailure, f64)> {
        let task_keywords = keywords(task_text);
        let window_start = now - chrono::Duration::days(FAILURE_WINDOW_DAYS);
        let mut scored: Vec<(PastFailure, f64)> = state
            .failures
            .iter()
            .filter(|f| f.occurred_at >= window_start)
            .map(|f| (f.clone(), jaccard(&task_keywords, &f.keywords())))
            .filter(|(_, score)| *score >= SIMILARITY_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(TOP_K_FAILURES);
        scored
    }
}

#[async_trait]
impl Knowledge for FileKnowledge {
    async fn query(&self, query: &KnowledgeQuery, now: DateTime<Utc>) -> Result<String> {
        let state = self.state.lock();

        let mut sections: Vec<String> = Vec::new();

        let golden: Vec<&Heuristic> =
            state.heuristics.iter().filter(|h| h.is_golden()).collect();
        if !golden.is_empty() {
            let mut section = String::from("## Golden rules\n");
            for rule in golden {
                section.push_str(&format!("- {}\n", rule.text));
            }
            sections.push(section);
        }

        let mut scored: Vec<(&Heuristic, f64)> = state
            .heuristics
            .iter()
            .filter(|h| !h.is_golden())
            .map(|h| (h, h.relevance(query.domain, now)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(TOP_K_HEURISTICS);
        if !scored.is_empty() {
            let mut section = String::from("## Heuristics\n");
            for (heuristic, score) in scored {
                section.push_str(&format!("- ({:.2}) {}\n", score, heuristic.text));
            }
            sections.push(section);
        }

        let failures = self.similar_failures(&state, &query.task_text, now);
        if !failures.is_empty() {
            let mut section = String::from("## Similar past failures\n");
            for (failure, score) in failures {
                section.push_str(&format!("- ({:.2}) {}: {}\n", score, failure.title, failure.summary));
            }
            sections.push(section);
        }

        let mut text = sections.join("\n");
        if query.max_chars > 0 && text.len() > query.max_chars {
            let mut cut = query.max_chars;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        Ok(text)
    }

    async fn record_outcome(&self, exec: &NodeExecution, now: DateTime<Utc>) -> Result<()> {
        if exec.status != NodeStatus::Failed {
            return Ok(());
        }
        let mut state = self.state.lock();
        let summary = exec
            .error_message
            .clone()
            .or_else(|| exec.result_text.clone())
            .unwrap_or_else(|| "no output".to_string());
        state.failures.push(PastFailure {
            title: format!(
                "{} {}",
                exec.node_id,
                exec.error_kind.map(|k| k.to_string()).unwrap_or_default()
            ),
            summary,
            tags: Vec::new(),
            occurred_at: now,
        });
        self.save(&state)
    }
}

#[cfg(test)]
#[path = "knowledge_tests.rs"]
mod tests;
