// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::AdapterError;
use hive_core::JobId;
use std::time::Duration;

fn msg(id: &str) -> QueueMessage {
    QueueMessage { job_id: JobId::from_string(id) }
}

const SHORT: Duration = Duration::from_millis(10);

#[tokio::test(start_paused = true)]
async fn memory_delivers_in_order() {
    let queue = MemoryQueue::new();
    queue.enqueue(msg("job-a")).await.unwrap();
    queue.enqueue(msg("job-b")).await.unwrap();

    let first = queue.receive(SHORT, Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(first.message.job_id, "job-a");
    assert_eq!(first.delivery_count, 1);

    let second = queue.receive(SHORT, Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(second.message.job_id, "job-b");
}

#[tokio::test(start_paused = true)]
async fn memory_empty_receive_times_out() {
    let queue = MemoryQueue::new();
    let got = queue.receive(Duration::from_millis(50), Duration::from_secs(60)).await.unwrap();
    assert!(got.is_none());
}

#[tokio::test(start_paused = true)]
async fn memory_leased_message_is_hidden() {
    let queue = MemoryQueue::new();
    queue.enqueue(msg("job-a")).await.unwrap();
    let _lease = queue.receive(SHORT, Duration::from_secs(60)).await.unwrap().unwrap();
    assert!(queue.receive(SHORT, Duration::from_secs(60)).await.unwrap().is_none());
    assert_eq!(queue.depth().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn memory_expired_lease_redelivers_with_count() {
    let queue = MemoryQueue::new();
    queue.enqueue(msg("job-a")).await.unwrap();
    let first = queue.receive(SHORT, Duration::from_secs(5)).await.unwrap().unwrap();
    assert_eq!(first.delivery_count, 1);

    tokio::time::advance(Duration::from_secs(6)).await;
    let second = queue.receive(SHORT, Duration::from_secs(5)).await.unwrap().unwrap();
    assert_eq!(second.message.job_id, "job-a");
    assert_eq!(second.delivery_count, 2);

    // The first receipt is now stale
    let err = queue.delete(&first.receipt).await.unwrap_err();
    assert!(matches!(err, AdapterError::StaleReceipt { .. }));

    // The live receipt works
    queue.delete(&second.receipt).await.unwrap();
    assert!(queue.receive(SHORT, Duration::from_secs(5)).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn memory_heartbeat_extends_lease() {
    let queue = MemoryQueue::new();
    queue.enqueue(msg("job-a")).await.unwrap();
    let lease = queue.receive(SHORT, Duration::from_secs(5)).await.unwrap().unwrap();

    tokio::time::advance(Duration::from_secs(4)).await;
    queue.extend(&lease.receipt, Duration::from_secs(5)).await.unwrap();

    // Past the original deadline but inside the extension: still hidden
    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(queue.receive(SHORT, Duration::from_secs(5)).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn memory_delete_is_terminal() {
    let queue = MemoryQueue::new();
    queue.enqueue(msg("job-a")).await.unwrap();
    let lease = queue.receive(SHORT, Duration::from_secs(5)).await.unwrap().unwrap();
    queue.delete(&lease.receipt).await.unwrap();

    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(queue.receive(SHORT, Duration::from_secs(5)).await.unwrap().is_none());
}

#[tokio::test]
async fn fs_queue_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let queue = FsQueue::new(dir.path()).unwrap();

    queue.enqueue(msg("job-a")).await.unwrap();
    assert_eq!(queue.depth().await.unwrap(), 1);

    let lease = queue.receive(SHORT, Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(lease.message.job_id, "job-a");
    assert_eq!(queue.depth().await.unwrap(), 0);

    queue.delete(&lease.receipt).await.unwrap();
    assert!(queue.receive(SHORT, Duration::from_secs(60)).await.unwrap().is_none());
}

#[tokio::test]
async fn fs_queue_expired_lease_redelivers() {
    let dir = tempfile::tempdir().unwrap();
    let queue = FsQueue::new(dir.path()).unwrap();
    queue.enqueue(msg("job-a")).await.unwrap();

    let first = queue.receive(SHORT, Duration::from_millis(20)).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    let second = queue.receive(SHORT, Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(second.delivery_count, 2);

    let err = queue.extend(&first.receipt, Duration::from_secs(60)).await.unwrap_err();
    assert!(matches!(err, AdapterError::StaleReceipt { .. }));
}

#[tokio::test]
async fn fs_queue_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let queue = FsQueue::new(dir.path()).unwrap();
        queue.enqueue(msg("job-a")).await.unwrap();
    }
    let queue = FsQueue::new(dir.path()).unwrap();
    let lease = queue.receive(SHORT, Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(lease.message.job_id, "job-a");
}
