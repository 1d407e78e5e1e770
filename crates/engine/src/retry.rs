// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry with exponential backoff for backend calls.
//!
//! Wraps every queue/store/blob call site. Only transient failures are
//! retried; anything else surfaces immediately.

use std::future::Future;
use std::time::Duration;

use hive_core::ErrorKind;

use crate::error::EngineError;
use crate::Result;

const ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(100);

/// Deterministic-enough jitter without a PRNG dependency: the clock's
/// sub-millisecond noise is plenty for spreading retries.
fn jitter() -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    Duration::from_millis(u64::from(nanos % 50))
}

/// Run `operation` up to three times, backing off exponentially between
/// transient failures.
pub async fn with_backoff<T, F, Fut>(label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = BASE_DELAY;
    let mut last = None;
    for attempt in 1..=ATTEMPTS {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.kind() == ErrorKind::TransientBackend && attempt < ATTEMPTS => {
                tracing::warn!(label, attempt, error = %e, "transient backend failure, retrying");
                tokio::time::sleep(delay + jitter()).await;
                delay *= 2;
                last = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    // Unreachable in practice: the loop always returns. Kept for totality.
    Err(last.unwrap_or(EngineError::Handler(format!("{label} failed"))))
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
