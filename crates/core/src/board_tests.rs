// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::{Clock, FakeClock};
use crate::run::RunId;

fn board_with_agent(clock: &FakeClock, agent: &str) -> Blackboard {
    let mut board = Blackboard::new(RunId::new(), clock.utc());
    board.agents.insert(
        agent.to_string(),
        BoardAgent {
            task: "explore".to_string(),
            state: BoardAgentState::Active,
            heartbeat_at: clock.utc(),
            interests: vec![],
            cursor: 0,
        },
    );
    board
}

fn chain(agent: &str, files: &[&str], clock: &FakeClock, ttl_secs: i64) -> ClaimChain {
    ClaimChain {
        agent_id: agent.to_string(),
        files: files.iter().map(|s| s.to_string()).collect(),
        reason: "edit".to_string(),
        claimed_at: clock.utc(),
        expires_at: clock.utc() + chrono::Duration::seconds(ttl_secs),
        status: ChainStatus::Active,
    }
}

#[test]
fn active_files_dedup_and_sort() {
    let clock = FakeClock::new();
    let mut board = board_with_agent(&clock, "a1");
    board.claim_chains.insert(ChainId::new(), chain("a1", &["b.rs", "a.rs"], &clock, 60));
    assert_eq!(board.active_files(clock.utc()), vec!["a.rs", "b.rs"]);
}

#[test]
fn conflicting_chains_finds_overlap() {
    let clock = FakeClock::new();
    let mut board = board_with_agent(&clock, "a1");
    let id = ChainId::new();
    board.claim_chains.insert(id, chain("a1", &["x.rs"], &clock, 60));

    let hits = board.conflicting_chains(&["x.rs".to_string(), "y.rs".to_string()], clock.utc());
    assert_eq!(hits, vec![id]);
    assert!(board.conflicting_chains(&["z.rs".to_string()], clock.utc()).is_empty());
}

#[test]
fn expired_chains_do_not_conflict() {
    let clock = FakeClock::new();
    let mut board = board_with_agent(&clock, "a1");
    board.claim_chains.insert(ChainId::new(), chain("a1", &["x.rs"], &clock, 10));
    let later = clock.utc() + chrono::Duration::seconds(11);
    assert!(board.conflicting_chains(&["x.rs".to_string()], later).is_empty());
}

#[test]
fn prune_expired_transitions_status() {
    let clock = FakeClock::new();
    let mut board = board_with_agent(&clock, "a1");
    let id = ChainId::new();
    board.claim_chains.insert(id, chain("a1", &["x.rs"], &clock, 10));

    assert_eq!(board.prune_expired(clock.utc()), 0);
    let later = clock.utc() + chrono::Duration::seconds(11);
    assert_eq!(board.prune_expired(later), 1);
    assert_eq!(board.claim_chains[&id].status, ChainStatus::Expired);
    // Second prune is a no-op
    assert_eq!(board.prune_expired(later), 0);
}

#[test]
fn stale_agents_by_heartbeat() {
    let clock = FakeClock::new();
    let mut board = board_with_agent(&clock, "a1");
    board.agents.insert(
        "a2".to_string(),
        BoardAgent {
            task: "verify".to_string(),
            state: BoardAgentState::Completed,
            heartbeat_at: clock.utc() - chrono::Duration::seconds(500),
            interests: vec![],
            cursor: 0,
        },
    );
    let timeout = chrono::Duration::seconds(120);
    // a1 fresh, a2 old but completed (not stale)
    assert!(board.stale_agents(clock.utc(), timeout).is_empty());

    let later = clock.utc() + chrono::Duration::seconds(121);
    assert_eq!(board.stale_agents(later, timeout), vec!["a1"]);
}

#[test]
fn completion_requires_all_terminal_and_no_open_tasks() {
    let clock = FakeClock::new();
    let mut board = board_with_agent(&clock, "a1");
    assert!(!board.is_complete());

    if let Some(a) = board.agents.get_mut("a1") {
        a.state = BoardAgentState::Completed;
    }
    assert!(board.is_complete());

    board.task_queue.push(BoardTask {
        id: "t1".to_string(),
        description: "leftover".to_string(),
        claimed_by: None,
        created_at: clock.utc(),
    });
    assert!(!board.is_complete());
}

#[test]
fn empty_board_is_not_complete() {
    let clock = FakeClock::new();
    let board = Blackboard::new(RunId::new(), clock.utc());
    assert!(!board.is_complete());
}

#[test]
fn invariants_catch_double_claim() {
    let clock = FakeClock::new();
    let mut board = board_with_agent(&clock, "a1");
    board.claim_chains.insert(ChainId::new(), chain("a1", &["x.rs"], &clock, 60));
    assert!(board.check_invariants(clock.utc()).is_ok());

    board.claim_chains.insert(ChainId::new(), chain("a1", &["x.rs"], &clock, 60));
    assert!(board.check_invariants(clock.utc()).is_err());
}

#[test]
fn invariants_catch_unregistered_owner() {
    let clock = FakeClock::new();
    let mut board = board_with_agent(&clock, "a1");
    board.claim_chains.insert(ChainId::new(), chain("ghost", &["x.rs"], &clock, 60));
    assert!(board.check_invariants(clock.utc()).is_err());
}

#[test]
fn serde_round_trip() {
    let clock = FakeClock::new();
    let mut board = board_with_agent(&clock, "a1");
    board.claim_chains.insert(ChainId::new(), chain("a1", &["x.rs"], &clock, 60));
    board.questions.push(BoardQuestion {
        agent_id: "a1".to_string(),
        content: "ttl?".to_string(),
        created_at: clock.utc(),
    });
    let json = serde_json::to_string(&board).unwrap();
    let restored: Blackboard = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, board);
}
