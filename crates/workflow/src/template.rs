// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt template interpolation.
//!
//! `${context.path.to.field}` placeholders resolve against the run
//! context; unknown placeholders are left as-is so a stray `${}` in prose
//! never aborts a run. Non-string values render as compact JSON.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// `${name}` or `${name.sub.field}`.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)*)\}")
        .expect("constant regex pattern is valid")
});

fn lookup<'v>(root: &'v Value, dotted: &str) -> Option<&'v Value> {
    let mut current = root;
    for segment in dotted.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpolate `${path}` placeholders from a JSON scope.
///
/// The scope is a JSON object whose top-level keys are the available
/// namespaces (typically `context`, plus per-node extras like `shard`,
/// `role`, or `board_path`).
pub fn render(template: &str, scope: &Value) -> String {
    VAR_PATTERN
        .replace_all(template, |caps: &regex::Captures| {
            let path = &caps[1];
            match lookup(scope, path) {
                Some(value) => render_value(value),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
