// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two swarm agents race for an overlapping file claim. Exactly one wins;
//! the loser learns who blocked it and retries successfully after release.

use hive_core::clock::Clock;
use hive_core::{RunId, SystemClock};
use hive_engine::{BoardStore, ClaimResult};
use std::time::Duration;

#[tokio::test]
async fn overlapping_claims_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let clock = SystemClock;
    let board =
        BoardStore::create(dir.path(), RunId::new(), Duration::from_secs(60), clock.utc()).unwrap();
    board.register_agent("audit-scout", "explore", vec![], clock.utc()).await.unwrap();
    board.register_agent("audit-fixer", "repair", vec![], clock.utc()).await.unwrap();

    let ttl = Duration::from_secs(300);
    let scout = board
        .claim_chain("audit-scout", vec!["src/cache.rs".into()], "inspect", ttl, clock.utc())
        .await
        .unwrap();
    let ClaimResult::Claimed(winner) = scout else { panic!("scout should win the empty board") };

    let fixer = board
        .claim_chain(
            "audit-fixer",
            vec!["src/cache.rs".into(), "src/lru.rs".into()],
            "rewrite",
            ttl,
            clock.utc(),
        )
        .await
        .unwrap();
    let ClaimResult::Blocked(blockers) = fixer else { panic!("overlap must block") };
    assert_eq!(blockers, vec![winner]);

    // The board-wide invariant held throughout: one active chain per file
    board.snapshot().unwrap().check_invariants(clock.utc()).unwrap();

    // Release, then the loser's retry succeeds
    board.release_chain("audit-scout", winner, clock.utc()).await.unwrap();
    let retry = board
        .claim_chain(
            "audit-fixer",
            vec!["src/cache.rs".into(), "src/lru.rs".into()],
            "rewrite",
            ttl,
            clock.utc(),
        )
        .await
        .unwrap();
    assert!(matches!(retry, ClaimResult::Claimed(_)));
}
