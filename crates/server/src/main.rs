// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hived`: the Hive orchestrator daemon.

use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hive_core::Config;
use hive_server::{AppContext, Listener};

fn init_tracing(data_dir: &std::path::Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_dir = data_dir.join("logs");
    match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(log_dir, "hived.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
    }
}

fn config_path() -> PathBuf {
    std::env::var_os("HIVE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("hive.toml"))
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("hived: {message}");
            return std::process::ExitCode::from(2);
        }
    };
    let _guard = init_tracing(&config.data_dir);

    let app = match AppContext::build(config).await {
        Ok(app) => Arc::new(app),
        Err(e) => {
            tracing::error!(error = %e, "failed to build application context");
            return std::process::ExitCode::from(2);
        }
    };

    let shutdown = CancellationToken::new();
    let socket_path = app.config.data_dir.join("hived.sock");
    let listener = Listener::new(app.clone(), socket_path, shutdown.clone());

    let dispatch = app.dispatch.clone();
    let dispatch_shutdown = dispatch.shutdown_token();
    let engine = tokio::spawn(async move { dispatch.run().await });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_shutdown.cancel();
            dispatch_shutdown.cancel();
        }
    });

    if let Err(e) = listener.run().await {
        tracing::error!(error = %e, "listener failed");
        shutdown.cancel();
        app.dispatch.shutdown_token().cancel();
        let _ = engine.await;
        return std::process::ExitCode::from(1);
    }
    let _ = engine.await;
    std::process::ExitCode::SUCCESS
}

fn load_config() -> Result<Config, String> {
    let path = config_path();
    if path.is_file() {
        Config::load(&path).map_err(|e| e.to_string())
    } else {
        // No config file: defaults with the ambient data dir
        Ok(Config::with_data_dir(
            std::env::var_os("HIVE_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| ".hive".into()),
        ))
    }
}
