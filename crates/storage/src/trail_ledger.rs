// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only trail ledger.
//!
//! Each process writes its own JSONL segment, so concurrent daemons never
//! contend; readers merge all segments. Appends buffer in memory and are
//! fsync'd as a batch by `flush`; callers that need the write durable
//! before acknowledging use `append_durable`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use hive_core::{Scent, Trail};

use crate::error::StorageError;
use crate::Result;

/// Read-side filters. All optional; `now` drives expiry and decay.
#[derive(Debug, Clone, Default)]
pub struct TrailQuery {
    pub location: Option<String>,
    pub scent: Option<Scent>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Drop results whose decayed strength falls below this floor.
    pub min_strength: f64,
}

pub struct TrailLedger {
    dir: PathBuf,
    segment_path: PathBuf,
    state: Mutex<WriterState>,
}

struct WriterState {
    pending: Vec<Trail>,
    file: Option<File>,
}

impl TrailLedger {
    /// Open a ledger directory, creating this process's segment lazily on
    /// first flush.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        let segment_path = dir.join(format!("trails-{}.jsonl", uuid::Uuid::new_v4()));
        Ok(Self { dir, segment_path, state: Mutex::new(WriterState { pending: Vec::new(), file: None }) })
    }

    /// Buffer a trail for the next flush.
    pub fn append(&self, trail: Trail) {
        self.state.lock().pending.push(trail);
    }

    /// Buffer and immediately flush: the record is on disk when this
    /// returns.
    pub fn append_durable(&self, trail: Trail) -> Result<()> {
        self.append(trail);
        self.flush()
    }

    /// Write all buffered trails and fsync the segment.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            return Ok(());
        }
        if state.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.segment_path)
                .map_err(|e| StorageError::io(self.segment_path.display().to_string(), e))?;
            state.file = Some(file);
        }
        let pending = std::mem::take(&mut state.pending);
        let Some(file) = state.file.as_mut() else {
            return Ok(());
        };
        for trail in &pending {
            let line = serde_json::to_string(trail)
                .map_err(|e| StorageError::Encode { id: trail.location.clone(), source: e })?;
            writeln!(file, "{line}")
                .map_err(|e| StorageError::io(self.segment_path.display().to_string(), e))?;
        }
        file.sync_data()
            .map_err(|e| StorageError::io(self.segment_path.display().to_string(), e))?;
        tracing::debug!(count = pending.len(), "trail batch flushed");
        Ok(())
    }

    fn segments(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| StorageError::io(self.dir.display().to_string(), e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("trails-") && n.ends_with(".jsonl"))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn read_segment(path: &Path) -> Result<Vec<Trail>> {
        let file = File::open(path).map_err(|e| StorageError::io(path.display().to_string(), e))?;
        let mut trails = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| StorageError::io(path.display().to_string(), e))?;
            if line.trim().is_empty() {
                continue;
            }
            // A torn tail line (crash mid-write) is skipped, not fatal.
            match serde_json::from_str::<Trail>(&line) {
                Ok(trail) => trails.push(trail),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping bad trail line");
                }
            }
        }
        Ok(trails)
    }

    /// Merge all segments, filter, and pair each trail with its decayed
    /// strength. Strongest first.
    pub fn query(&self, query: &TrailQuery, now: DateTime<Utc>) -> Result<Vec<(Trail, f64)>> {
        self.flush()?;
        let mut results = Vec::new();
        for path in self.segments()? {
            for trail in Self::read_segment(&path)? {
                if trail.is_expired(now) {
                    continue;
                }
                if query.location.as_deref().is_some_and(|l| l != trail.location) {
                    continue;
                }
                if query.scent.is_some_and(|s| s != trail.scent) {
                    continue;
                }
                if query.since.is_some_and(|t| trail.created_at < t) {
                    continue;
                }
                if query.until.is_some_and(|t| trail.created_at > t) {
                    continue;
                }
                let effective = trail.effective_strength(now);
                if effective < query.min_strength {
                    continue;
                }
                results.push((trail, effective));
            }
        }
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    /// Maintenance pass: rewrite every segment without expired records.
    /// Returns how many were dropped.
    pub fn compact(&self, now: DateTime<Utc>) -> Result<usize> {
        self.flush()?;
        let mut dropped = 0;
        for path in self.segments()? {
            let trails = Self::read_segment(&path)?;
            let kept: Vec<&Trail> = trails.iter().filter(|t| !t.is_expired(now)).collect();
            if kept.len() == trails.len() {
                continue;
            }
            dropped += trails.len() - kept.len();
            let tmp = path.with_extension(format!("tmp.{}", nanoid::nanoid!(6)));
            let mut out = File::create(&tmp)
                .map_err(|e| StorageError::io(tmp.display().to_string(), e))?;
            for trail in kept {
                let line = serde_json::to_string(trail)
                    .map_err(|e| StorageError::Encode { id: trail.location.clone(), source: e })?;
                writeln!(out, "{line}").map_err(|e| StorageError::io(tmp.display().to_string(), e))?;
            }
            out.sync_data().map_err(|e| StorageError::io(tmp.display().to_string(), e))?;
            std::fs::rename(&tmp, &path)
                .map_err(|e| StorageError::io(path.display().to_string(), e))?;
        }
        Ok(dropped)
    }
}

impl Drop for TrailLedger {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
#[path = "trail_ledger_tests.rs"]
mod tests;
