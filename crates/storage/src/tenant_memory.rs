// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-tenant memory partitions.
//!
//! Knowledge and trails are state, and state is partitioned by tenant the
//! same way job records are: one store per tenant, opened lazily under
//! `memory/<tenant>/`, never shared across the boundary. A conductor asks
//! for its tenant's handles; nothing hands it another tenant's.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use hive_core::TenantId;

use crate::knowledge::FileKnowledge;
use crate::trail_ledger::TrailLedger;
use crate::Result;

/// Lazily opened, cached per-tenant knowledge stores and trail ledgers.
pub struct TenantMemory {
    /// The `memory/` root; each tenant gets its own subtree.
    root: PathBuf,
    knowledge: Mutex<HashMap<TenantId, Arc<FileKnowledge>>>,
    trails: Mutex<HashMap<TenantId, Arc<TrailLedger>>>,
}

impl TenantMemory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            knowledge: Mutex::new(HashMap::new()),
            trails: Mutex::new(HashMap::new()),
        }
    }

    fn tenant_dir(&self, tenant: &TenantId) -> PathBuf {
        self.root.join(tenant.as_str())
    }

    /// The tenant's knowledge store (`memory/<tenant>/knowledge.json`).
    pub fn knowledge(&self, tenant: &TenantId) -> Result<Arc<FileKnowledge>> {
        if let Some(store) = self.knowledge.lock().get(tenant) {
            return Ok(store.clone());
        }
        let store = Arc::new(FileKnowledge::open(self.tenant_dir(tenant))?);
        Ok(self
            .knowledge
            .lock()
            .entry(tenant.clone())
            .or_insert(store)
            .clone())
    }

    /// The tenant's trail ledger (`memory/<tenant>/trails/`).
    pub fn trails(&self, tenant: &TenantId) -> Result<Arc<TrailLedger>> {
        if let Some(ledger) = self.trails.lock().get(tenant) {
            return Ok(ledger.clone());
        }
        let ledger = Arc::new(TrailLedger::open(self.tenant_dir(tenant).join("trails"))?);
        Ok(self
            .trails
            .lock()
            .entry(tenant.clone())
            .or_insert(ledger)
            .clone())
    }
}

#[cfg(test)]
#[path = "tenant_memory_tests.rs"]
mod tests;
