// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blob store primitive.
//!
//! Keys are slash-separated prefixes built from validated identifiers
//! (`artifacts/<tenant>/jobs/<job>/result.json`). The filesystem
//! implementation still refuses traversal segments outright; a key that
//! reaches here un-validated is a bug upstream, not something to escape.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::AdapterError;
use crate::Result;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

fn check_key(key: &str) -> Result<()> {
    let suspicious = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if suspicious {
        return Err(AdapterError::UnsafeKey { key: key.to_string() });
    }
    Ok(())
}

// ── In-memory implementation ────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        check_key(key)?;
        self.blobs.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        Ok(self.blobs.lock().get(key).cloned())
    }
}

// ── Filesystem implementation ───────────────────────────────────────────

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AdapterError::io(parent.display().to_string(), e))?;
        }
        let tmp = path.with_extension(format!("tmp.{}", nanoid::nanoid!(6)));
        std::fs::write(&tmp, bytes).map_err(|e| AdapterError::io(tmp.display().to_string(), e))?;
        std::fs::rename(&tmp, &path).map_err(|e| AdapterError::io(path.display().to_string(), e))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AdapterError::io(path.display().to_string(), e)),
        }
    }
}

#[cfg(test)]
#[path = "blob_tests.rs"]
mod tests;
