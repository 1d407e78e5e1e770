// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::AdapterError;

fn spec() -> TaskSpec {
    TaskSpec {
        name: "hive-job-abc123".to_string(),
        task_definition: "hive-worker".to_string(),
        command: None,
        env: vec![
            ("JOB_ID".to_string(), "job-abc123".to_string()),
            ("TENANT_ID".to_string(), "default".to_string()),
        ],
        namespace: "hive-jobs".to_string(),
    }
}

#[test]
fn manifest_carries_env_and_image() {
    let manifest = KubeTaskLauncher::manifest(&spec()).unwrap();
    let spec_json = serde_json::to_value(&manifest).unwrap();
    let container = &spec_json["spec"]["template"]["spec"]["containers"][0];
    assert_eq!(container["image"], "hive-worker");
    assert_eq!(container["env"][0]["name"], "JOB_ID");
    assert_eq!(container["env"][0]["value"], "job-abc123");
    assert!(container.get("command").is_none());
    // One attempt per launch; retries are the orchestrator's call
    assert_eq!(spec_json["spec"]["backoffLimit"], 0);
}

#[test]
fn manifest_command_override() {
    let mut s = spec();
    s.command = Some(vec!["hive-agent".to_string(), "--once".to_string()]);
    let manifest = KubeTaskLauncher::manifest(&s).unwrap();
    let spec_json = serde_json::to_value(&manifest).unwrap();
    let container = &spec_json["spec"]["template"]["spec"]["containers"][0];
    assert_eq!(container["command"][0], "hive-agent");
}

#[tokio::test]
async fn fake_launcher_records_and_scripts() {
    let launcher = FakeTaskLauncher::new();
    launcher.push_outcome(TaskOutcome::Failed { message: "oom".to_string() });

    let handle = launcher.launch(spec()).await.unwrap();
    assert_eq!(handle.name, "hive-job-abc123");
    assert_eq!(launcher.launched.lock().len(), 1);

    let cancel = tokio_util::sync::CancellationToken::new();
    let outcome = launcher
        .wait(&handle, std::time::Duration::from_millis(1), std::time::Duration::from_secs(1), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome, TaskOutcome::Failed { message: "oom".to_string() });
}

#[tokio::test]
async fn fake_launcher_honors_cancellation() {
    let launcher = FakeTaskLauncher::new();
    let handle = launcher.launch(spec()).await.unwrap();
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let err = launcher
        .wait(&handle, std::time::Duration::from_millis(1), std::time::Duration::from_secs(1), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Cancelled));
}
