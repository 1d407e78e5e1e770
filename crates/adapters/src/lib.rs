// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-adapters: thin adapters over the backend primitives.
//!
//! Queue, keyed-record store, blob store, task launch, terminal-multiplexer
//! sessions, and the LLM provider all live behind traits here so the rest of
//! the workspace stays backend-agnostic. Filesystem implementations are the
//! local-first defaults; in-memory implementations back the tests.

pub mod blob;
pub mod error;
pub mod kv;
pub mod provider;
pub mod queue;
pub mod session;
pub mod task;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::AdapterError;
pub use kv::{FsKvStore, KvStore, MemoryKvStore, Versioned, VERSION_ABSENT};
pub use provider::{GenerateRequest, Generation, HttpProvider, Provider, Usage};
#[cfg(any(test, feature = "test-support"))]
pub use provider::ScriptedProvider;
pub use queue::{FsQueue, JobQueue, LeasedMessage, MemoryQueue, QueueMessage, Receipt};
pub use session::TmuxSessions;
#[cfg(any(test, feature = "test-support"))]
pub use task::FakeTaskLauncher;
pub use task::{KubeTaskLauncher, TaskHandle, TaskLauncher, TaskOutcome, TaskSpec};

pub type Result<T> = std::result::Result<T, AdapterError>;
