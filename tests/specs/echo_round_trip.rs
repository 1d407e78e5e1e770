// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submit an echo job, watch it succeed, read the result back.

use super::support::Harness;
use hive_adapters::BlobStore;
use hive_core::JobState;
use serde_json::json;

#[tokio::test]
async fn echo_round_trip() {
    let harness = Harness::new();
    let job_id = harness
        .engine
        .submit(harness.tenant(), "echo", json!({"message": "hello"}))
        .await
        .expect("submit");

    harness.drain().await;

    let job = harness.jobs.require(&harness.tenant(), &job_id).await.expect("job record");
    assert_eq!(job.state, JobState::Succeeded);
    assert!(job.error_kind.is_none());
    assert!(job.error_message.is_none());

    let pointer = job.result_pointer.expect("result pointer set in terminal state");
    let bytes = harness.blob.get(&pointer).await.expect("blob read").expect("result blob");
    let result: serde_json::Value = serde_json::from_slice(&bytes).expect("result json");
    assert_eq!(result["echoed"], "hello");
    assert!(result["processed_at"].as_str().is_some());
}

#[tokio::test]
async fn submitted_payload_reads_back_byte_equal() {
    let harness = Harness::new();
    let payload = json!({"message": "hello", "extra": {"nested": [1, 2, 3]}});
    let job_id = harness
        .engine
        .submit(harness.tenant(), "echo", payload.clone())
        .await
        .expect("submit");

    let job = harness.jobs.require(&harness.tenant(), &job_id).await.expect("job record");
    assert_eq!(job.payload, payload);
}
