// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared wiring for the end-to-end scenarios: in-memory backends, a
//! scripted provider, and the in-process executor strategy.

use std::sync::Arc;

use hive_adapters::{MemoryBlobStore, MemoryKvStore, MemoryQueue, ScriptedProvider};
use hive_core::{Config, TenantId};
use hive_engine::conductor::ConductorDeps;
use hive_engine::{
    ChatHandler, DispatchEngine, EchoHandler, HandlerRegistry, InProcessStrategy, WorkflowHandler,
};
use hive_storage::{JobStore, TenantMemory};

pub struct Harness {
    #[allow(dead_code)]
    pub dir: tempfile::TempDir,
    pub config: Arc<Config>,
    pub kv: Arc<MemoryKvStore>,
    pub queue: Arc<MemoryQueue>,
    pub blob: Arc<MemoryBlobStore>,
    pub provider: Arc<ScriptedProvider>,
    pub deps: ConductorDeps,
    pub jobs: JobStore,
    pub engine: DispatchEngine,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::with_data_dir(dir.path());
        config.dispatch.poll_interval_ms = 10;
        config.watcher.poll_interval_secs = 1;
        let config = Arc::new(config);

        let kv = Arc::new(MemoryKvStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let blob = Arc::new(MemoryBlobStore::new());
        let provider = Arc::new(ScriptedProvider::new());
        let jobs = JobStore::new(kv.clone());

        let registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));
        registry.register(Arc::new(ChatHandler::new(provider.clone())));
        let strategy = Arc::new(InProcessStrategy::new(registry.clone(), provider.clone()));
        let deps = ConductorDeps {
            kv: kv.clone(),
            strategy: strategy.clone(),
            memory: Arc::new(TenantMemory::new(dir.path().join("memory"))),
            config: config.clone(),
        };
        registry.register(Arc::new(WorkflowHandler::new(deps.clone())));

        let engine = DispatchEngine::new(
            queue.clone(),
            jobs.clone(),
            blob.clone(),
            registry,
            strategy,
            config.clone(),
        );

        Self { dir, config, kv, queue, blob, provider, deps, jobs, engine }
    }

    pub fn tenant(&self) -> TenantId {
        TenantId::default_tenant()
    }

    /// Process queued messages until the queue drains.
    pub async fn drain(&self) {
        let worker = hive_core::WorkerId::new("spec-worker");
        while self.engine.run_one(&worker).await.expect("dispatch") {}
    }
}
