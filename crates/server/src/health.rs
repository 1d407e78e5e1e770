// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health checks: one cheap probe per backend dependency.

use hive_wire::{DependencyHealth, HealthSummary};

use crate::app::AppContext;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn check(app: &AppContext) -> HealthSummary {
    let queue_depth = app.queue.depth().await;
    let queue_ok = queue_depth.is_ok();
    let store_ok = app.kv.list("health").await.is_ok();
    let blob_ok = app.blob.exists("health/probe").await.is_ok();

    HealthSummary {
        ok: queue_ok && store_ok && blob_ok,
        version: VERSION.to_string(),
        dependencies: DependencyHealth { queue: queue_ok, store: store_ok, blob: blob_ok },
        registered_types: app.registry.names().iter().map(|s| s.to_string()).collect(),
        queue_depth: queue_depth.unwrap_or(0),
    }
}
