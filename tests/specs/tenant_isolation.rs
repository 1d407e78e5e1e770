// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One tenant's job id means nothing to another tenant, and neither does
//! its memory.

use super::support::Harness;
use hive_core::clock::Clock;
use hive_core::{SystemClock, TenantId};
use hive_storage::{
    Domain, Heuristic, JobFilter, Knowledge, KnowledgeQuery, StorageError, TrailQuery,
    GOLDEN_THRESHOLD,
};
use serde_json::json;

#[tokio::test]
async fn job_ids_do_not_cross_tenants() {
    let harness = Harness::new();
    let tenant_a = TenantId::new("acme").unwrap();
    let tenant_b = TenantId::new("globex").unwrap();

    let job_id = harness
        .engine
        .submit(tenant_a.clone(), "echo", json!({"message": "private"}))
        .await
        .expect("submit");

    // Tenant B queries the same job id: not found, never the record
    assert!(harness.jobs.get(&tenant_b, &job_id).await.expect("get").is_none());
    let err = harness.jobs.require(&tenant_b, &job_id).await.expect_err("require");
    assert!(matches!(err, StorageError::NotFound { .. }));

    // Listings are scoped too
    assert_eq!(harness.jobs.list(&tenant_a, &JobFilter::default()).await.unwrap().len(), 1);
    assert!(harness.jobs.list(&tenant_b, &JobFilter::default()).await.unwrap().is_empty());

    // The owner still sees it
    assert!(harness.jobs.get(&tenant_a, &job_id).await.expect("get").is_some());
}

#[tokio::test]
async fn workspace_and_artifact_paths_are_tenant_scoped() {
    let harness = Harness::new();
    let workspace = harness.config.workspace_dir("acme", "job-1");
    assert!(workspace.ends_with("workspaces/acme/job-1"));
    assert_eq!(harness.config.artifact_prefix("acme", "job-1"), "artifacts/acme/jobs/job-1");
    assert!(harness.config.memory_dir("acme").ends_with("memory/acme"));
}

#[tokio::test]
async fn knowledge_and_trails_do_not_cross_tenants() {
    let harness = Harness::new();
    let clock = SystemClock;
    let tenant_a = TenantId::new("acme").unwrap();
    let tenant_b = TenantId::new("globex").unwrap();

    // Tenant A's conductor memory learns something, through the same
    // partition the conductor resolves at run time
    harness
        .deps
        .memory
        .knowledge(&tenant_a)
        .unwrap()
        .upsert_heuristic(Heuristic {
            id: "h1".to_string(),
            text: "acme deploys on tuesdays".to_string(),
            base: 0.8,
            domain: Domain::General,
            validation_count: GOLDEN_THRESHOLD,
            updated_at: clock.utc(),
        })
        .unwrap();

    let acme = harness
        .deps
        .memory
        .knowledge(&tenant_a)
        .unwrap()
        .query(&KnowledgeQuery::new("deploys"), clock.utc())
        .await
        .unwrap();
    assert!(acme.contains("acme deploys on tuesdays"));

    // Tenant B's prompts never see tenant A's heuristics
    let globex = harness
        .deps
        .memory
        .knowledge(&tenant_b)
        .unwrap()
        .query(&KnowledgeQuery::new("deploys"), clock.utc())
        .await
        .unwrap();
    assert!(globex.is_empty(), "cross-tenant knowledge leak: {globex}");

    // Trail ledgers are partitioned the same way
    harness
        .deps
        .memory
        .trails(&tenant_a)
        .unwrap()
        .append_durable(hive_core::Trail::new(
            "src/private.rs",
            hive_core::LocationKind::File,
            hive_core::Scent::Hot,
            0.9,
            "agent-1",
            "acme activity",
            clock.utc(),
        ))
        .unwrap();
    let globex_trails = harness.deps.memory.trails(&tenant_b).unwrap();
    assert!(globex_trails.query(&TrailQuery::default(), clock.utc()).unwrap().is_empty());
}
