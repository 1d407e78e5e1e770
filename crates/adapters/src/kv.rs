// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed-record store with optimistic versioning.
//!
//! The version counter makes compare-and-swap possible one layer up (the
//! job store's state transitions). Version 0 means "absent": a put that
//! expects 0 is an exclusive create.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::AdapterError;
use crate::Result;

/// The version an absent record reports. Expecting it makes a put an
/// exclusive create.
pub const VERSION_ABSENT: u64 = 0;

/// A record with its current version.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// Keyed-record store. Scopes partition the keyspace (one per record type
/// per tenant); keys are validated identifiers, so they are path-safe.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<Versioned<Value>>>;

    /// Write a record. `expected` of `None` writes unconditionally;
    /// `Some(v)` fails with a version conflict unless the current version
    /// is exactly `v`. Returns the new version.
    async fn put(
        &self,
        scope: &str,
        key: &str,
        value: Value,
        expected: Option<u64>,
    ) -> Result<u64>;

    /// All keys in a scope, unordered.
    async fn list(&self, scope: &str) -> Result<Vec<String>>;
}

// ── In-memory implementation ────────────────────────────────────────────

/// HashMap-backed store for tests and embedded use.
#[derive(Default)]
pub struct MemoryKvStore {
    records: Mutex<HashMap<(String, String), Versioned<Value>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<Versioned<Value>>> {
        Ok(self.records.lock().get(&(scope.to_string(), key.to_string())).cloned())
    }

    async fn put(
        &self,
        scope: &str,
        key: &str,
        value: Value,
        expected: Option<u64>,
    ) -> Result<u64> {
        let mut records = self.records.lock();
        let entry_key = (scope.to_string(), key.to_string());
        let current = records.get(&entry_key).map(|v| v.version).unwrap_or(VERSION_ABSENT);
        if let Some(expected) = expected {
            if current != expected {
                return Err(AdapterError::VersionConflict {
                    key: format!("{scope}/{key}"),
                    expected,
                    found: current,
                });
            }
        }
        let next = current + 1;
        records.insert(entry_key, Versioned { value, version: next });
        Ok(next)
    }

    async fn list(&self, scope: &str) -> Result<Vec<String>> {
        Ok(self
            .records
            .lock()
            .keys()
            .filter(|(s, _)| s == scope)
            .map(|(_, k)| k.clone())
            .collect())
    }
}

// ── Filesystem implementation ───────────────────────────────────────────

/// One JSON file per record under `root/<scope>/<key>.json`, written with
/// a temp-file rename so readers never observe a torn record. The store
/// mutex serializes read-check-write cycles; cross-process writers are out
/// of scope (the daemon owns its state directory).
pub struct FsKvStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsKvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), write_lock: Mutex::new(()) }
    }

    fn record_path(&self, scope: &str, key: &str) -> PathBuf {
        self.root.join(scope).join(format!("{key}.json"))
    }

    fn read_record(&self, scope: &str, key: &str) -> Result<Option<Versioned<Value>>> {
        let path = self.record_path(scope, key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AdapterError::io(path.display().to_string(), e)),
        };
        let record = serde_json::from_slice(&bytes)
            .map_err(|e| AdapterError::corrupt(path.display().to_string(), e))?;
        Ok(Some(record))
    }

    fn write_record(&self, scope: &str, key: &str, record: &Versioned<Value>) -> Result<()> {
        let path = self.record_path(scope, key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AdapterError::io(parent.display().to_string(), e))?;
        }
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| AdapterError::corrupt(path.display().to_string(), e))?;
        let tmp = path.with_extension(format!("tmp.{}", nanoid::nanoid!(6)));
        std::fs::write(&tmp, bytes).map_err(|e| AdapterError::io(tmp.display().to_string(), e))?;
        std::fs::rename(&tmp, &path).map_err(|e| AdapterError::io(path.display().to_string(), e))
    }
}

#[async_trait]
impl KvStore for FsKvStore {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<Versioned<Value>>> {
        self.read_record(scope, key)
    }

    async fn put(
        &self,
        scope: &str,
        key: &str,
        value: Value,
        expected: Option<u64>,
    ) -> Result<u64> {
        let _guard = self.write_lock.lock();
        let current = self.read_record(scope, key)?.map(|v| v.version).unwrap_or(VERSION_ABSENT);
        if let Some(expected) = expected {
            if current != expected {
                return Err(AdapterError::VersionConflict {
                    key: format!("{scope}/{key}"),
                    expected,
                    found: current,
                });
            }
        }
        let next = current + 1;
        self.write_record(scope, key, &Versioned { value, version: next })?;
        Ok(next)
    }

    async fn list(&self, scope: &str) -> Result<Vec<String>> {
        let dir = self.root.join(scope);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AdapterError::io(dir.display().to_string(), e)),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AdapterError::io(dir.display().to_string(), e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
