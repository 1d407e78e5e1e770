// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definition loading.
//!
//! Two sources, one schema: JSON values straight out of a job payload,
//! and HCL files on disk for operator-authored workflows. Every load path
//! ends in [`validate_workflow`], so a returned definition is ready to run.

use std::path::Path;

use crate::error::WorkflowError;
use crate::types::WorkflowDef;
use crate::validate::validate_workflow;

/// Load from a JSON value (the `workflow` job payload shape).
pub fn from_value(value: serde_json::Value) -> Result<WorkflowDef, WorkflowError> {
    let def: WorkflowDef =
        serde_json::from_value(value).map_err(|e| WorkflowError::Parse(e.to_string()))?;
    validate_workflow(&def)?;
    Ok(def)
}

/// Load from HCL text.
pub fn from_hcl_str(text: &str) -> Result<WorkflowDef, WorkflowError> {
    let def: WorkflowDef = hcl::from_str(text).map_err(|e| WorkflowError::Parse(e.to_string()))?;
    validate_workflow(&def)?;
    Ok(def)
}

/// Load from a file, dispatching on extension (`.hcl`, `.json`).
pub fn load_file(path: &Path) -> Result<WorkflowDef, WorkflowError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| WorkflowError::Io { path: path.display().to_string(), source: e })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("hcl") => from_hcl_str(&text),
        Some("json") => {
            let value = serde_json::from_str(&text).map_err(|e| WorkflowError::Parse(e.to_string()))?;
            from_value(value)
        }
        other => Err(WorkflowError::Parse(format!("unsupported workflow extension {other:?}"))),
    }
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
