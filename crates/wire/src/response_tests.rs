// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hive_core::ErrorKind;

#[test]
fn error_constructor() {
    let response = Response::error(ErrorKind::NotFound, "job job-1 not found");
    assert!(response.is_error());
    let Response::Error { error } = response else { panic!("wrong variant") };
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert_eq!(error.message, "job job-1 not found");
}

#[test]
fn error_kind_is_stable_on_the_wire() {
    let response = Response::error(ErrorKind::TransientBackend, "queue down");
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["error"]["kind"], "transient_backend");
}

#[test]
fn success_variants_are_not_errors() {
    assert!(!Response::JobSubmitted { job_id: "job-1".to_string() }.is_error());
}
