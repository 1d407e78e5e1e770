// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application context.
//!
//! Everything process-wide (configuration, backend adapters, the handler
//! registry, the dispatch engine, the tenant resolver) is constructed
//! once here and passed down explicitly. No module-level mutable state.

use std::sync::Arc;

use hive_adapters::{
    BlobStore, FsBlobStore, FsKvStore, FsQueue, HttpProvider, JobQueue, KubeTaskLauncher, KvStore,
    Provider, TmuxSessions,
};
use hive_core::config::StrategyKind;
use hive_core::Config;
use hive_engine::conductor::ConductorDeps;
use hive_engine::{
    ChatHandler, DispatchEngine, EchoHandler, ExecutorStrategy, HandlerRegistry, InProcessStrategy,
    MuxStrategy, TaskLaunchStrategy, WorkflowHandler,
};
use hive_storage::{JobStore, TenantMemory};

use crate::tenants::TenantResolver;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Adapter(#[from] hive_adapters::AdapterError),

    #[error(transparent)]
    Storage(#[from] hive_storage::StorageError),
}

pub struct AppContext {
    pub config: Arc<Config>,
    pub queue: Arc<dyn JobQueue>,
    pub kv: Arc<dyn KvStore>,
    pub blob: Arc<dyn BlobStore>,
    pub jobs: JobStore,
    pub registry: HandlerRegistry,
    pub dispatch: DispatchEngine,
    pub tenants: Arc<TenantResolver>,
}

impl AppContext {
    /// Wire the whole process from configuration. Filesystem backends,
    /// registered built-in handlers, and the configured executor strategy.
    pub async fn build(config: Config) -> Result<Self, BuildError> {
        let config = Arc::new(config);
        let data = &config.data_dir;

        let queue: Arc<dyn JobQueue> = Arc::new(FsQueue::new(data.join("queue"))?);
        let kv: Arc<dyn KvStore> = Arc::new(FsKvStore::new(data.join("state")));
        let blob: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(data.clone()));
        let jobs = JobStore::new(kv.clone());

        let provider: Arc<dyn Provider> = Arc::new(HttpProvider::new(config.provider.clone())?);
        // Knowledge and trails are opened per tenant on demand, each under
        // its own memory/<tenant>/ subtree
        let memory = Arc::new(TenantMemory::new(data.join("memory")));

        let registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));
        registry.register(Arc::new(ChatHandler::new(provider.clone())));

        let strategy: Arc<dyn ExecutorStrategy> = match config.dispatch.strategy {
            StrategyKind::InProcess => {
                Arc::new(InProcessStrategy::new(registry.clone(), provider.clone()))
            }
            StrategyKind::TaskLaunch => {
                let launcher = Arc::new(KubeTaskLauncher::connect().await?);
                Arc::new(TaskLaunchStrategy::new(
                    launcher,
                    blob.clone(),
                    config.task_launch.clone(),
                ))
            }
            StrategyKind::Mux => Arc::new(MuxStrategy::new(
                TmuxSessions::new(),
                config.dispatch.agent_command.clone(),
            )),
        };

        let deps = ConductorDeps {
            kv: kv.clone(),
            strategy: strategy.clone(),
            memory,
            config: config.clone(),
        };
        registry.register(Arc::new(WorkflowHandler::new(deps)));

        let dispatch = DispatchEngine::new(
            queue.clone(),
            jobs.clone(),
            blob.clone(),
            registry.clone(),
            strategy,
            config.clone(),
        );
        let tenants = Arc::new(TenantResolver::new(config.auth.clone()));

        tracing::info!(
            data_dir = %config.data_dir.display(),
            strategy = %config.dispatch.strategy,
            types = ?registry.names(),
            "application context built"
        );
        Ok(Self { config, queue, kv, blob, jobs, registry, dispatch, tenants })
    }
}
