// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hive_core::clock::Clock;
use hive_core::FakeClock;

fn signal(dir: &Path, clock: &FakeClock) -> EscalationSignal {
    EscalationSignal::new(
        EscalationReason::StaleAgents,
        vec!["audit-scout".to_string(), "audit-verifier".to_string()],
        vec!["[blocker] connection error".to_string()],
        vec!["line one".to_string(), "line two".to_string()],
        clock.utc(),
        dir.join("board-abc.signal"),
    )
}

#[test]
fn write_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let original = signal(dir.path(), &clock);
    original.write().unwrap();

    let loaded = EscalationSignal::load(&original.path).unwrap();
    assert_eq!(loaded.id, original.id);
    assert_eq!(loaded.reason, EscalationReason::StaleAgents);
    assert_eq!(loaded.stale_agents, original.stale_agents);
    assert_eq!(loaded.error_excerpts, original.error_excerpts);
    assert_eq!(loaded.log_tail, original.log_tail);
    assert_eq!(loaded.created_at, original.created_at);
}

#[test]
fn write_is_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let first = signal(dir.path(), &clock);
    first.write().unwrap();

    // A second signal at the same path must fail, not overwrite
    let second = signal(dir.path(), &clock);
    assert!(second.write().is_err());
}

#[test]
fn archive_moves_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let signal = signal(dir.path(), &clock);
    signal.write().unwrap();

    signal.archive().unwrap();
    assert!(!signal.path.exists(), "signal absence is the clear-to-resume indication");
    let archived = dir.path().join("archive").join(format!("{}.signal", signal.id));
    assert!(archived.is_file());
}

#[test]
fn parse_rejects_garbage() {
    assert!(EscalationSignal::parse("not a signal", PathBuf::from("/tmp/x")).is_err());
}

#[test]
fn empty_stale_list_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let mut signal = signal(dir.path(), &clock);
    signal.stale_agents.clear();
    signal.write().unwrap();
    let loaded = EscalationSignal::load(&signal.path).unwrap();
    assert!(loaded.stale_agents.is_empty());
}

#[test]
fn reason_parse() {
    assert_eq!("stale_agents".parse::<EscalationReason>().unwrap(), EscalationReason::StaleAgents);
    assert_eq!("errors".parse::<EscalationReason>().unwrap(), EscalationReason::Errors);
    assert!("nope".parse::<EscalationReason>().is_err());
}
