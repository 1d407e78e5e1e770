// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier injection is refused at submit; no job record appears.

use super::support::Harness;
use hive_core::ErrorKind;
use hive_storage::JobFilter;
use serde_json::json;

#[tokio::test]
async fn workflow_with_shell_metacharacters_in_node_id_is_refused() {
    let harness = Harness::new();
    let err = harness
        .engine
        .submit(
            harness.tenant(),
            "workflow",
            json!({"workflow": {
                "name": "evil",
                "nodes": [{"id": "node; rm -rf /", "kind": "single", "prompt_template": "x"}],
                "edges": [
                    {"from": "__start__", "to": "node; rm -rf /"},
                    {"from": "node; rm -rf /", "to": "__end__"},
                ],
            }}),
        )
        .await
        .expect_err("injection must be rejected");
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Rejected before any side effect: no record, no message
    let jobs = harness.jobs.list(&harness.tenant(), &JobFilter::default()).await.expect("list");
    assert!(jobs.is_empty());
    assert_eq!(
        hive_adapters::JobQueue::depth(harness.queue.as_ref()).await.expect("depth"),
        0
    );
}

#[tokio::test]
async fn oversized_and_empty_identifiers_are_validation_errors() {
    use hive_core::{validate, IdKind, ValidateError};

    assert!(matches!(validate("", IdKind::Run), Err(ValidateError::Empty { .. })));
    let long = "a".repeat(101);
    assert!(matches!(validate(&long, IdKind::Run), Err(ValidateError::TooLong { .. })));
}
