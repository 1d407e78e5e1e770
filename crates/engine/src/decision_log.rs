// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only conductor decision log, one record list per run.

use std::sync::Arc;

use hive_adapters::{AdapterError, KvStore};
use hive_core::{ConductorDecision, RunId, TenantId};

use crate::Result;

#[derive(Clone)]
pub struct DecisionLog {
    kv: Arc<dyn KvStore>,
    tenant: TenantId,
}

impl DecisionLog {
    pub fn new(kv: Arc<dyn KvStore>, tenant: TenantId) -> Self {
        Self { kv, tenant }
    }

    fn scope(&self) -> String {
        format!("decisions/{}", self.tenant)
    }

    /// Append one decision. CAS loop against concurrent writers (the
    /// conductor and tier-2 both append).
    pub async fn append(&self, decision: ConductorDecision) -> Result<()> {
        let scope = self.scope();
        let key = decision.run_id.to_string();
        loop {
            let current = self.kv.get(&scope, &key).await?;
            let (mut list, version) = match current {
                Some(versioned) => {
                    let list: Vec<ConductorDecision> =
                        serde_json::from_value(versioned.value).unwrap_or_default();
                    (list, versioned.version)
                }
                None => (Vec::new(), 0),
            };
            list.push(decision.clone());
            let value = serde_json::to_value(&list)
                .map_err(|e| crate::EngineError::Handler(format!("decision encode failed: {e}")))?;
            match self.kv.put(&scope, &key, value, Some(version)).await {
                Ok(_) => return Ok(()),
                Err(AdapterError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn for_run(&self, run_id: &RunId) -> Result<Vec<ConductorDecision>> {
        let current = self.kv.get(&self.scope(), run_id.as_str()).await?;
        Ok(current
            .map(|versioned| serde_json::from_value(versioned.value).unwrap_or_default())
            .unwrap_or_default())
    }
}
