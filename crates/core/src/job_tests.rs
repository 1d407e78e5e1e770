// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::{Clock, FakeClock};
use crate::error::ErrorKind;
use crate::tenant::TenantId;
use crate::test_support::strategies::*;
use proptest::prelude::*;

fn queued_job(clock: &FakeClock) -> Job {
    Job::new(TenantId::default_tenant(), "echo", serde_json::json!({"message": "hi"}), clock.utc())
}

#[test]
fn new_job_is_queued() {
    let clock = FakeClock::new();
    let job = queued_job(&clock);
    assert_eq!(job.state, JobState::Queued);
    assert!(job.id.as_str().starts_with("job-"));
    assert!(job.worker_id.is_none());
    assert!(job.result_pointer.is_none());
    assert_eq!(job.created_at, job.updated_at);
}

#[yare::parameterized(
    queued_running      = { JobState::Queued,    JobState::Running,   true },
    queued_cancelled    = { JobState::Queued,    JobState::Cancelled, true },
    running_succeeded   = { JobState::Running,   JobState::Succeeded, true },
    running_failed      = { JobState::Running,   JobState::Failed,    true },
    queued_succeeded    = { JobState::Queued,    JobState::Succeeded, false },
    queued_failed       = { JobState::Queued,    JobState::Failed,    false },
    running_cancelled   = { JobState::Running,   JobState::Cancelled, false },
    running_queued      = { JobState::Running,   JobState::Queued,    false },
    succeeded_queued    = { JobState::Succeeded, JobState::Queued,    false },
    succeeded_running   = { JobState::Succeeded, JobState::Running,   false },
    failed_running      = { JobState::Failed,    JobState::Running,   false },
    cancelled_running   = { JobState::Cancelled, JobState::Running,   false },
    succeeded_failed    = { JobState::Succeeded, JobState::Failed,    false },
)]
fn transition_arrows(from: JobState, to: JobState, allowed: bool) {
    assert_eq!(from.can_transition(to), allowed);
}

#[yare::parameterized(
    queued    = { JobState::Queued,    false },
    running   = { JobState::Running,   false },
    succeeded = { JobState::Succeeded, true },
    failed    = { JobState::Failed,    true },
    cancelled = { JobState::Cancelled, true },
)]
fn terminal_states(state: JobState, terminal: bool) {
    assert_eq!(state.is_terminal(), terminal);
}

#[test]
fn start_sets_worker_and_running() {
    let clock = FakeClock::new();
    let mut job = queued_job(&clock);
    clock.advance(std::time::Duration::from_secs(1));
    assert!(job.start(WorkerId::new("w-1"), clock.utc()));
    assert_eq!(job.state, JobState::Running);
    assert_eq!(job.worker_id.as_ref().map(WorkerId::as_str), Some("w-1"));
    assert!(job.updated_at > job.created_at);
}

#[test]
fn succeed_requires_running() {
    let clock = FakeClock::new();
    let mut job = queued_job(&clock);
    assert!(!job.succeed("artifacts/default/jobs/x/result.json", clock.utc()));
    assert!(job.start(WorkerId::new("w-1"), clock.utc()));
    assert!(job.succeed("artifacts/default/jobs/x/result.json", clock.utc()));
    assert_eq!(job.state, JobState::Succeeded);
    assert!(job.result_pointer.is_some());
    // Worker lease is released by the terminal write
    assert!(job.worker_id.is_none());
}

#[test]
fn fail_records_kind_and_message() {
    let clock = FakeClock::new();
    let mut job = queued_job(&clock);
    job.start(WorkerId::new("w-1"), clock.utc());
    assert!(job.fail(ErrorKind::Handler, "boom", clock.utc()));
    assert_eq!(job.error_kind, Some(ErrorKind::Handler));
    assert_eq!(job.error_message.as_deref(), Some("boom"));
}

#[test]
fn no_downgrade_from_terminal() {
    let clock = FakeClock::new();
    let mut job = queued_job(&clock);
    job.start(WorkerId::new("w-1"), clock.utc());
    job.succeed("ptr", clock.utc());
    let before = job.clone();
    assert!(!job.transition(JobState::Queued, clock.utc()));
    assert!(!job.transition(JobState::Running, clock.utc()));
    assert!(!job.fail(ErrorKind::Handler, "late", clock.utc()));
    assert_eq!(job, before);
}

#[test]
fn updated_at_is_monotonic() {
    let clock = FakeClock::new();
    let mut job = queued_job(&clock);
    let t1 = job.updated_at;
    // A touch with an older timestamp must not move updated_at backwards
    job.touch(t1 - chrono::Duration::seconds(10));
    assert_eq!(job.updated_at, t1);
    job.touch(t1 + chrono::Duration::seconds(10));
    assert_eq!(job.updated_at, t1 + chrono::Duration::seconds(10));
}

#[test]
fn lease_expiry() {
    let clock = FakeClock::new();
    let mut job = queued_job(&clock);
    job.start(WorkerId::new("w-1"), clock.utc());
    let timeout = chrono::Duration::seconds(300);
    assert!(!job.lease_expired(clock.utc(), timeout));
    assert!(job.lease_expired(clock.utc() + chrono::Duration::seconds(301), timeout));
    // QUEUED jobs never report an expired lease
    let queued = queued_job(&clock);
    assert!(!queued.lease_expired(clock.utc() + chrono::Duration::seconds(999), timeout));
}

#[test]
fn serde_round_trip() {
    let clock = FakeClock::new();
    let mut job = queued_job(&clock);
    job.start(WorkerId::new("w-1"), clock.utc());
    let json = serde_json::to_string(&job).unwrap();
    let restored: Job = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, job);
}

#[test]
fn state_serializes_screaming() {
    assert_eq!(serde_json::to_string(&JobState::Queued).unwrap(), "\"QUEUED\"");
    assert_eq!(serde_json::to_string(&JobState::Succeeded).unwrap(), "\"SUCCEEDED\"");
}

proptest! {
    #[test]
    fn job_state_serde_roundtrip(state in arb_job_state()) {
        let json = serde_json::to_string(&state).unwrap();
        let parsed: JobState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(state, parsed);
    }

    #[test]
    fn terminal_states_admit_no_transition(from in arb_job_state(), to in arb_job_state()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition(to));
        }
    }
}
