// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-storage: durable state on top of the backend primitives.
//!
//! The job store serializes state transitions with optimistic CAS; the
//! trail ledger appends fsync'd batches and decays on read; the knowledge
//! store injects rules, heuristics, and similar past failures into prompts.

pub mod error;
pub mod job_store;
pub mod knowledge;
pub mod tenant_memory;
pub mod trail_ledger;

pub use error::StorageError;
pub use job_store::{ClaimOutcome, JobFilter, JobStore};
pub use knowledge::{
    Domain, FileKnowledge, Heuristic, Knowledge, KnowledgeQuery, PastFailure, GOLDEN_THRESHOLD,
};
pub use tenant_memory::TenantMemory;
pub use trail_ledger::{TrailLedger, TrailQuery};

pub type Result<T> = std::result::Result<T, StorageError>;
