// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A swarm agent stops heartbeating. Tier-1 escalates, tier-2 restarts,
//! and the run proceeds to completion.

use hive_adapters::MemoryKvStore;
use hive_core::clock::Clock;
use hive_core::config::WatcherConfig;
use hive_core::{BoardAgentState, RunId, SystemClock, TenantId};
use hive_engine::{
    BoardStore, DecisionLog, Tier1Decision, Tier1Watcher, Tier2Action, Tier2Handler,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn stale_agent_is_restarted_and_the_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let clock = SystemClock;
    let run_id = RunId::new();
    let board =
        BoardStore::create(dir.path(), run_id, Duration::from_secs(60), clock.utc()).unwrap();
    board.register_agent("audit-scout", "explore", vec![], clock.utc()).await.unwrap();
    board.register_agent("audit-fixer", "repair", vec![], clock.utc()).await.unwrap();

    // The scout stops heartbeating
    let stale_at = clock.utc() - chrono::Duration::seconds(500);
    board
        .update(stale_at, |b| {
            if let Some(agent) = b.agents.get_mut("audit-scout") {
                agent.heartbeat_at = stale_at;
            }
            Ok(())
        })
        .await
        .unwrap();

    let config = WatcherConfig::default();
    let escalations = dir.path().join("escalations");
    let mut tier1 = Tier1Watcher::new(
        BoardStore::open(board.path(), Duration::from_secs(60)),
        config.clone(),
        escalations,
    );

    // Tier-1 detects and escalates
    let decision = tier1.poll_once(clock.utc()).unwrap();
    assert!(matches!(decision, Tier1Decision::InterventionNeeded(_)));
    let exit = tier1.watch(&tokio_util::sync::CancellationToken::new()).await.unwrap();
    let hive_engine::watcher::WatchExit::Escalated(signal) = exit else {
        panic!("expected escalation")
    };
    assert_eq!(signal.stale_agents, vec!["audit-scout".to_string()]);

    // Tier-2 chooses restart; stale → active with a fresh heartbeat
    let decisions = DecisionLog::new(
        Arc::new(MemoryKvStore::new()),
        TenantId::default_tenant(),
    );
    let tier2 = Tier2Handler::new(
        BoardStore::open(board.path(), Duration::from_secs(60)),
        config,
        decisions.clone(),
        run_id,
    );
    let action = tier2.handle(&signal).await.unwrap();
    assert_eq!(action, Tier2Action::Restart);
    assert!(!signal.path.exists(), "signal archived, tier-1 clear to resume");

    let snapshot = board.snapshot().unwrap();
    assert_eq!(snapshot.agents["audit-scout"].state, BoardAgentState::Active);
    assert!(snapshot.agents["audit-scout"].heartbeat_at > stale_at);

    // The agents finish; tier-1's next verdict is Complete
    board.set_agent_state("audit-scout", BoardAgentState::Completed, clock.utc()).await.unwrap();
    board.set_agent_state("audit-fixer", BoardAgentState::Completed, clock.utc()).await.unwrap();
    assert_eq!(tier1.poll_once(clock.utc()).unwrap(), Tier1Decision::Complete);
    tier1.cleanup().unwrap();
    assert!(!board.path().exists());

    // The intervention is on the audit trail
    let audit = decisions.for_run(&run_id).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].data["action"], "restart");
}
