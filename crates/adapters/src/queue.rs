// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job queue primitive with visibility leases.
//!
//! At-least-once delivery: a received message is hidden for the visibility
//! timeout and reappears unless deleted. Receipts carry a lease token so a
//! worker whose lease expired cannot delete a message that has since been
//! redelivered to someone else.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use hive_core::JobId;

use crate::error::AdapterError;
use crate::Result;

/// What travels through the queue: just the job id. The payload lives in
/// the job record, which keeps messages tiny and redelivery harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub job_id: JobId,
}

/// Opaque proof of a held lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub(crate) job_id: JobId,
    pub(crate) token: String,
}

/// A message plus its lease.
#[derive(Debug, Clone)]
pub struct LeasedMessage {
    pub message: QueueMessage,
    pub receipt: Receipt,
    /// 1 on first delivery; grows on each redelivery.
    pub delivery_count: u32,
}

/// Queue operations the dispatcher relies on.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, message: QueueMessage) -> Result<()>;

    /// Receive one message, waiting up to `wait` for one to arrive.
    /// The returned lease hides the message for `visibility`.
    async fn receive(&self, wait: Duration, visibility: Duration) -> Result<Option<LeasedMessage>>;

    /// Extend the lease (visibility heartbeat).
    async fn extend(&self, receipt: &Receipt, visibility: Duration) -> Result<()>;

    /// Acknowledge and remove the message.
    async fn delete(&self, receipt: &Receipt) -> Result<()>;

    /// Messages currently waiting (not leased). Used by health reporting.
    async fn depth(&self) -> Result<usize>;
}

// ── In-memory implementation ────────────────────────────────────────────

struct MemoryEntry {
    message: QueueMessage,
    /// None when available; Some((token, lease_deadline)) while leased.
    lease: Option<(String, tokio::time::Instant)>,
    delivery_count: u32,
}

/// Tokio-native queue for tests and single-process deployments. Uses
/// `tokio::time::Instant` so paused-time tests control lease expiry.
#[derive(Default)]
pub struct MemoryQueue {
    entries: Mutex<Vec<MemoryEntry>>,
    arrival: Arc<Notify>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()), arrival: Arc::new(Notify::new()) }
    }

    fn try_lease(&self, visibility: Duration) -> Option<LeasedMessage> {
        let now = tokio::time::Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries.iter_mut().find(|e| match &e.lease {
            None => true,
            Some((_, deadline)) => *deadline <= now,
        })?;
        let token = uuid::Uuid::new_v4().to_string();
        entry.lease = Some((token.clone(), now + visibility));
        entry.delivery_count += 1;
        Some(LeasedMessage {
            message: entry.message.clone(),
            receipt: Receipt { job_id: entry.message.job_id, token },
            delivery_count: entry.delivery_count,
        })
    }

    fn holds_lease(entry: &MemoryEntry, receipt: &Receipt) -> bool {
        entry.message.job_id == receipt.job_id
            && entry.lease.as_ref().is_some_and(|(token, _)| *token == receipt.token)
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<()> {
        self.entries.lock().push(MemoryEntry { message, lease: None, delivery_count: 0 });
        self.arrival.notify_waiters();
        Ok(())
    }

    async fn receive(&self, wait: Duration, visibility: Duration) -> Result<Option<LeasedMessage>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(leased) = self.try_lease(visibility) {
                return Ok(Some(leased));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Wake on arrival or give expired leases another look shortly.
            let _ = tokio::time::timeout_at(
                deadline.min(now + Duration::from_millis(100)),
                self.arrival.notified(),
            )
            .await;
        }
    }

    async fn extend(&self, receipt: &Receipt, visibility: Duration) -> Result<()> {
        let mut entries = self.entries.lock();
        let entry = entries
            .iter_mut()
            .find(|e| Self::holds_lease(e, receipt))
            .ok_or_else(|| AdapterError::StaleReceipt { job_id: receipt.job_id.to_string() })?;
        entry.lease = Some((receipt.token.clone(), tokio::time::Instant::now() + visibility));
        Ok(())
    }

    async fn delete(&self, receipt: &Receipt) -> Result<()> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| !Self::holds_lease(e, receipt));
        if entries.len() == before {
            return Err(AdapterError::StaleReceipt { job_id: receipt.job_id.to_string() });
        }
        Ok(())
    }

    async fn depth(&self) -> Result<usize> {
        let now = tokio::time::Instant::now();
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| match &e.lease {
                None => true,
                Some((_, deadline)) => *deadline <= now,
            })
            .count())
    }
}

// ── Filesystem implementation ───────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct FsEnvelope {
    message: QueueMessage,
    enqueued_at_ms: u64,
    /// Epoch ms; 0 when never leased.
    lease_until_ms: u64,
    lease_token: String,
    delivery_count: u32,
}

/// Directory-backed queue: one JSON envelope per message, leases recorded
/// inside the envelope. Good enough for a single daemon per data dir; a
/// real broker slots in behind the same trait.
pub struct FsQueue {
    dir: PathBuf,
    scan_lock: Mutex<()>,
}

impl FsQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| AdapterError::io(dir.display().to_string(), e))?;
        Ok(Self { dir, scan_lock: Mutex::new(()) })
    }

    fn epoch_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn envelope_path(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }

    fn read_envelope(&self, path: &PathBuf) -> Result<Option<FsEnvelope>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AdapterError::io(path.display().to_string(), e)),
        };
        let envelope = serde_json::from_slice(&bytes)
            .map_err(|e| AdapterError::corrupt(path.display().to_string(), e))?;
        Ok(Some(envelope))
    }

    fn write_envelope(&self, path: &PathBuf, envelope: &FsEnvelope) -> Result<()> {
        let bytes = serde_json::to_vec(envelope)
            .map_err(|e| AdapterError::corrupt(path.display().to_string(), e))?;
        let tmp = path.with_extension(format!("tmp.{}", nanoid::nanoid!(6)));
        std::fs::write(&tmp, bytes).map_err(|e| AdapterError::io(tmp.display().to_string(), e))?;
        std::fs::rename(&tmp, path).map_err(|e| AdapterError::io(path.display().to_string(), e))
    }

    fn scan(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| AdapterError::io(self.dir.display().to_string(), e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn try_lease(&self, visibility: Duration) -> Result<Option<LeasedMessage>> {
        let _guard = self.scan_lock.lock();
        let now = Self::epoch_ms();
        for path in self.scan()? {
            let Some(mut envelope) = self.read_envelope(&path)? else { continue };
            if envelope.lease_until_ms > now {
                continue;
            }
            envelope.lease_until_ms = now + visibility.as_millis() as u64;
            envelope.lease_token = uuid::Uuid::new_v4().to_string();
            envelope.delivery_count += 1;
            self.write_envelope(&path, &envelope)?;
            return Ok(Some(LeasedMessage {
                receipt: Receipt {
                    job_id: envelope.message.job_id,
                    token: envelope.lease_token.clone(),
                },
                delivery_count: envelope.delivery_count,
                message: envelope.message,
            }));
        }
        Ok(None)
    }
}

#[async_trait]
impl JobQueue for FsQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<()> {
        let path = self.envelope_path(&message.job_id);
        let envelope = FsEnvelope {
            message,
            enqueued_at_ms: Self::epoch_ms(),
            lease_until_ms: 0,
            lease_token: String::new(),
            delivery_count: 0,
        };
        self.write_envelope(&path, &envelope)
    }

    async fn receive(&self, wait: Duration, visibility: Duration) -> Result<Option<LeasedMessage>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(leased) = self.try_lease(visibility)? {
                return Ok(Some(leased));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn extend(&self, receipt: &Receipt, visibility: Duration) -> Result<()> {
        let _guard = self.scan_lock.lock();
        let path = self.envelope_path(&receipt.job_id);
        let Some(mut envelope) = self.read_envelope(&path)? else {
            return Err(AdapterError::StaleReceipt { job_id: receipt.job_id.to_string() });
        };
        if envelope.lease_token != receipt.token {
            return Err(AdapterError::StaleReceipt { job_id: receipt.job_id.to_string() });
        }
        envelope.lease_until_ms = Self::epoch_ms() + visibility.as_millis() as u64;
        self.write_envelope(&path, &envelope)
    }

    async fn delete(&self, receipt: &Receipt) -> Result<()> {
        let _guard = self.scan_lock.lock();
        let path = self.envelope_path(&receipt.job_id);
        let Some(envelope) = self.read_envelope(&path)? else {
            return Err(AdapterError::StaleReceipt { job_id: receipt.job_id.to_string() });
        };
        if envelope.lease_token != receipt.token {
            return Err(AdapterError::StaleReceipt { job_id: receipt.job_id.to_string() });
        }
        std::fs::remove_file(&path).map_err(|e| AdapterError::io(path.display().to_string(), e))
    }

    async fn depth(&self) -> Result<usize> {
        let now = Self::epoch_ms();
        let mut depth = 0;
        for path in self.scan()? {
            if let Some(envelope) = self.read_envelope(&path)? {
                if envelope.lease_until_ms <= now {
                    depth += 1;
                }
            }
        }
        Ok(depth)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
