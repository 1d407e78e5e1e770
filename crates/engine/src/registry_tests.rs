// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::context::JobContext;
use crate::error::EngineError;
use crate::Result;

struct NopHandler;

#[async_trait]
impl Handler for NopHandler {
    fn spec(&self) -> HandlerSpec {
        HandlerSpec {
            name: "nop",
            fields: vec![
                FieldSpec::required("target", FieldKind::String),
                FieldSpec::optional("count", FieldKind::Number),
                FieldSpec::optional("flags", FieldKind::Array),
            ],
        }
    }

    async fn run(&self, _ctx: &JobContext, _payload: &Value) -> Result<Value> {
        Ok(json!({}))
    }
}

fn registry() -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    registry.register(Arc::new(NopHandler));
    registry
}

#[test]
fn lookup_and_names() {
    let registry = registry();
    assert!(registry.contains("nop"));
    assert!(!registry.contains("ghost"));
    assert_eq!(registry.names(), vec!["nop"]);
}

#[test]
fn clones_share_the_table() {
    let registry = HandlerRegistry::new();
    let clone = registry.clone();
    registry.register(Arc::new(NopHandler));
    assert!(clone.contains("nop"));
}

#[test]
fn unknown_type_rejected() {
    let err = registry().check_submission("ghost", &json!({})).unwrap_err();
    assert!(matches!(err, EngineError::UnknownJobType { .. }));
    assert_eq!(err.kind(), hive_core::ErrorKind::Validation);
}

#[test]
fn schema_checks() {
    let registry = registry();

    // Valid
    registry.check_submission("nop", &json!({"target": "x"})).unwrap();
    registry.check_submission("nop", &json!({"target": "x", "count": 3})).unwrap();
    // Extra keys pass through
    registry.check_submission("nop", &json!({"target": "x", "extra": true})).unwrap();
    // Explicit null on an optional field is fine
    registry.check_submission("nop", &json!({"target": "x", "count": null})).unwrap();

    // Missing required
    let err = registry.check_submission("nop", &json!({})).unwrap_err();
    assert!(matches!(err, EngineError::PayloadSchema { ref field, .. } if field == "target"));

    // Wrong kinds
    assert!(registry.check_submission("nop", &json!({"target": 5})).is_err());
    assert!(registry.check_submission("nop", &json!({"target": "x", "count": "three"})).is_err());
    assert!(registry.check_submission("nop", &json!({"target": "x", "flags": {}})).is_err());

    // Non-object payloads
    assert!(registry.check_submission("nop", &json!("just a string")).is_err());
}
