// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job type registry and payload schema validation.
//!
//! Each handler declares its payload fields; validation runs at dispatch
//! entry, before any side effect, so handlers receive payloads they can
//! deserialize without defensive checks.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::JobContext;
use crate::error::EngineError;
use crate::Result;

/// Declared payload field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Object,
    Array,
}

hive_core::simple_display! {
    FieldKind {
        String => "string",
        Number => "number",
        Bool => "bool",
        Object => "object",
        Array => "array",
    }
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// Handler declaration: name plus payload schema.
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl HandlerSpec {
    /// Check a payload against the declared fields. Unknown keys pass
    /// through untouched; handlers own their forward compatibility.
    pub fn check(&self, payload: &Value) -> Result<()> {
        let Some(map) = payload.as_object() else {
            return Err(EngineError::PayloadSchema {
                field: "payload".to_string(),
                problem: "must be a JSON object".to_string(),
            });
        };
        for field in &self.fields {
            match map.get(field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(EngineError::PayloadSchema {
                        field: field.name.to_string(),
                        problem: "is required".to_string(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    if !field.kind.matches(value) {
                        return Err(EngineError::PayloadSchema {
                            field: field.name.to_string(),
                            problem: format!("must be a {}", field.kind),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// A registered job handler.
#[async_trait]
pub trait Handler: Send + Sync {
    fn spec(&self) -> HandlerSpec;

    /// Submission-time validation. The default checks the declared field
    /// schema; handlers with deeper invariants (workflow structure) extend
    /// it so a bad payload never creates a job record.
    fn validate_payload(&self, payload: &Value) -> Result<()> {
        self.spec().check(payload)
    }

    /// Execute the job. The returned value becomes `result.json` in the
    /// artifact store. Handlers are required to be pure with respect to
    /// `(job_id, payload)`: a redelivered job must produce the same result.
    async fn run(&self, ctx: &JobContext, payload: &Value) -> Result<Value>;
}

/// Registered job types. Populated at startup; clones share the same
/// table, so wiring order between handlers and strategies doesn't matter.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<parking_lot::RwLock<HashMap<&'static str, Arc<dyn Handler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn Handler>) {
        self.handlers.write().insert(handler.spec().name, handler);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().get(job_type).cloned()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.read().contains_key(job_type)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.read().keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Validate a submission before any record is written.
    pub fn check_submission(&self, job_type: &str, payload: &Value) -> Result<()> {
        let handler = self
            .get(job_type)
            .ok_or_else(|| EngineError::UnknownJobType { job_type: job_type.to_string() })?;
        handler.validate_payload(payload)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
