// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared engine test fixture: in-memory backends, scripted provider,
//! tempdir-backed knowledge and trails.

use std::sync::Arc;

use hive_adapters::{MemoryBlobStore, MemoryKvStore, MemoryQueue, ScriptedProvider};
use hive_core::{Config, TenantId};
use hive_storage::{JobStore, TenantMemory};

use crate::conductor::ConductorDeps;
use crate::dispatch::DispatchEngine;
use crate::handlers::{ChatHandler, EchoHandler, WorkflowHandler};
use crate::registry::HandlerRegistry;
use crate::strategy::InProcessStrategy;

pub(crate) struct Fixture {
    // Held for the lifetime of the fixture; dropped with it.
    #[allow(dead_code)]
    pub dir: tempfile::TempDir,
    pub config: Arc<Config>,
    pub kv: Arc<MemoryKvStore>,
    pub queue: Arc<MemoryQueue>,
    pub blob: Arc<MemoryBlobStore>,
    pub provider: Arc<ScriptedProvider>,
    pub deps: ConductorDeps,
    pub registry: HandlerRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::with_data_dir(dir.path());
        // Tests want fast loops
        config.dispatch.poll_interval_ms = 10;
        config.watcher.poll_interval_secs = 1;
        let config = Arc::new(config);

        let kv = Arc::new(MemoryKvStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let blob = Arc::new(MemoryBlobStore::new());
        let provider = Arc::new(ScriptedProvider::new());
        let memory = Arc::new(TenantMemory::new(dir.path().join("memory")));

        let registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));
        registry.register(Arc::new(ChatHandler::new(provider.clone())));

        let deps = ConductorDeps {
            kv: kv.clone(),
            strategy: Arc::new(InProcessStrategy::new(registry.clone(), provider.clone())),
            memory,
            config: config.clone(),
        };
        registry.register(Arc::new(WorkflowHandler::new(deps.clone())));

        Self { dir, config, kv, queue, blob, provider, deps, registry }
    }

    pub fn tenant(&self) -> TenantId {
        TenantId::default_tenant()
    }

    pub fn job_store(&self) -> JobStore {
        JobStore::new(self.kv.clone())
    }

    pub fn dispatch(&self) -> DispatchEngine {
        DispatchEngine::new(
            self.queue.clone(),
            self.job_store(),
            self.blob.clone(),
            self.registry.clone(),
            self.deps.strategy.clone(),
            self.config.clone(),
        )
    }
}
