// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket listener translating wire requests into engine calls.
//!
//! One task per connection, one request per frame, a hard timeout per
//! request. Every failure becomes a typed error response; the process
//! never drops a connection without answering.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use hive_core::{ErrorKind, JobId};
use hive_storage::JobFilter;
use hive_wire::{read_message, write_message, BoardSummary, JobDetail, Request, Response};

use crate::app::AppContext;
use crate::health;
use crate::tenants::ResolveError;

/// Per-request processing bound.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Results at or under this size are inlined into the job detail.
const INLINE_RESULT_LIMIT: usize = 64 * 1024;

pub struct Listener {
    app: Arc<AppContext>,
    socket_path: PathBuf,
    shutdown: CancellationToken,
}

impl Listener {
    pub fn new(app: Arc<AppContext>, socket_path: PathBuf, shutdown: CancellationToken) -> Self {
        Self { app, socket_path, shutdown }
    }

    /// Bind and serve until shutdown.
    pub async fn run(&self) -> std::io::Result<()> {
        let _ = std::fs::remove_file(&self.socket_path);
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(socket = %self.socket_path.display(), "listener bound");

        loop {
            let stream = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };
            let app = self.app.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(app, stream, shutdown).await {
                    tracing::debug!(error = %e, "connection ended");
                }
            });
        }
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn serve_connection(
    app: Arc<AppContext>,
    mut stream: UnixStream,
    shutdown: CancellationToken,
) -> Result<(), hive_wire::ProtocolError> {
    loop {
        let request: Request = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            request = read_message(&mut stream) => match request {
                Ok(request) => request,
                Err(hive_wire::ProtocolError::Closed) => return Ok(()),
                Err(e) => return Err(e),
            },
        };
        let response = match tokio::time::timeout(REQUEST_TIMEOUT, handle(&app, request)).await {
            Ok(response) => response,
            Err(_) => Response::error(ErrorKind::Timeout, "request timed out"),
        };
        write_message(&mut stream, &response).await?;
    }
}

/// Dispatch one request. Infallible by construction: every error path
/// folds into a typed error response.
pub async fn handle(app: &AppContext, request: Request) -> Response {
    let tenant = match app.tenants.resolve(request.credential()) {
        Ok(tenant) => tenant,
        Err(ResolveError::Unauthorized) => {
            return Response::error(ErrorKind::Validation, "unknown credential")
        }
        Err(e) => return Response::error(ErrorKind::PermanentBackend, e.to_string()),
    };

    match request {
        Request::SubmitJob { job_type, payload, .. } => {
            match app.dispatch.submit(tenant, &job_type, payload).await {
                Ok(job_id) => Response::JobSubmitted { job_id: job_id.to_string() },
                Err(e) => Response::error(e.kind(), e.to_string()),
            }
        }

        Request::GetJob { job_id, .. } => {
            let id = JobId::from_string(&job_id);
            match app.jobs.get(&tenant, &id).await {
                Ok(Some(job)) => {
                    let mut detail = JobDetail::from(&job);
                    if let Some(pointer) = &job.result_pointer {
                        detail.result = inline_result(app, pointer).await;
                    }
                    Response::Job { job: Box::new(detail) }
                }
                Ok(None) => {
                    Response::error(ErrorKind::NotFound, format!("job {job_id} not found"))
                }
                Err(e) => Response::error(e.kind(), e.to_string()),
            }
        }

        Request::ListJobs { state, job_type, limit, offset, .. } => {
            let state = match state.as_deref().map(parse_state).transpose() {
                Ok(state) => state,
                Err(message) => return Response::error(ErrorKind::Validation, message),
            };
            let filter = JobFilter { state, job_type, limit, offset };
            match app.jobs.list(&tenant, &filter).await {
                Ok(jobs) => {
                    Response::Jobs { jobs: jobs.iter().map(hive_wire::JobSummary::from).collect() }
                }
                Err(e) => Response::error(e.kind(), e.to_string()),
            }
        }

        Request::CancelJob { job_id, .. } => {
            let id = JobId::from_string(&job_id);
            match app.dispatch.cancel(&tenant, &id).await {
                Ok(hive_storage::ClaimOutcome::Claimed(job)) => Response::JobCancelled {
                    job_id,
                    state: job.state.to_string(),
                },
                Ok(hive_storage::ClaimOutcome::Miss(state)) => Response::error(
                    ErrorKind::Conflict,
                    format!("job {job_id} is {state}, not cancellable"),
                ),
                Err(e) => Response::error(e.kind(), e.to_string()),
            }
        }

        Request::ListAgents { .. } => match board_summaries(app, tenant.as_str()) {
            Ok(boards) => Response::Agents { boards },
            Err(message) => Response::error(ErrorKind::TransientBackend, message),
        },

        Request::Health => Response::Health { health: health::check(app).await },
    }
}

fn parse_state(s: &str) -> Result<hive_core::JobState, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown job state {s:?}"))
}

async fn inline_result(app: &AppContext, pointer: &str) -> Option<serde_json::Value> {
    let bytes = app.blob.get(pointer).await.ok()??;
    if bytes.len() > INLINE_RESULT_LIMIT {
        return None;
    }
    serde_json::from_slice(&bytes).ok()
}

/// Walk the tenant's workspace tree for live blackboard files.
fn board_summaries(app: &AppContext, tenant: &str) -> Result<Vec<BoardSummary>, String> {
    let clock = hive_core::SystemClock;
    use hive_core::clock::Clock;
    let now = clock.utc();

    let root = app.config.data_dir.join("workspaces").join(tenant);
    let mut boards = Vec::new();
    let mut stack = vec![root];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("board-") && name.ends_with(".json")) {
                continue;
            }
            let bytes = std::fs::read(&path).map_err(|e| e.to_string())?;
            let Ok(board) = serde_json::from_slice::<hive_core::Blackboard>(&bytes) else {
                continue;
            };
            boards.push(BoardSummary {
                run_id: board.run_id.to_string(),
                agents: board
                    .agents
                    .iter()
                    .map(|(id, agent)| hive_wire::AgentSummary {
                        agent_id: id.clone(),
                        task: agent.task.clone(),
                        state: agent.state.to_string(),
                        heartbeat_at: agent.heartbeat_at.to_rfc3339(),
                    })
                    .collect(),
                finding_count: board.findings.len(),
                active_chains: board.claim_chains.values().filter(|c| c.is_active(now)).count(),
                open_questions: board.questions.len(),
            });
        }
    }
    Ok(boards)
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
