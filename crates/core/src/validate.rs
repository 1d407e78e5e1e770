// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier validation.
//!
//! Single chokepoint for every identifier that flows into a filename, an
//! environment variable, or a subprocess argument. Rules are enforced by
//! explicit character-class checks, never by escaping. Rejections name the
//! offending character so callers can produce actionable errors.

use serde::{Deserialize, Serialize};

/// Maximum identifier length in bytes.
pub const MAX_IDENT_LEN: usize = 100;

/// Maximum filename extension length (alphanumerics after the dot).
const MAX_EXT_LEN: usize = 10;

/// What the identifier will be used as. Controls the allowed character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Node,
    Workflow,
    Run,
    Agent,
    /// Like the base rule, but interior spaces are allowed ("code reviewer").
    AgentType,
    /// Like the base rule, but one trailing `.ext` (1–10 alphanumerics) is allowed.
    Filename,
    Tenant,
}

crate::simple_display! {
    IdKind {
        Node => "node",
        Workflow => "workflow",
        Run => "run",
        Agent => "agent",
        AgentType => "agent_type",
        Filename => "filename",
        Tenant => "tenant",
    }
}

/// Why an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidateError {
    #[error("{kind} identifier is empty")]
    Empty { kind: IdKind },

    #[error("{kind} identifier exceeds {max} bytes ({len})")]
    TooLong { kind: IdKind, len: usize, max: usize },

    #[error("{kind} identifier contains disallowed character {ch:?} at byte {pos}")]
    BadChar { kind: IdKind, ch: char, pos: usize },

    #[error("{kind} identifier must start with an alphanumeric, found {ch:?}")]
    BadStart { kind: IdKind, ch: char },

    #[error("{kind} identifier must end with an alphanumeric, found {ch:?}")]
    BadEnd { kind: IdKind, ch: char },

    #[error("filename extension must be 1–{MAX_EXT_LEN} alphanumerics, found {ext:?}")]
    BadExtension { ext: String },
}

/// Validate an identifier for the given use, returning it unchanged on success.
///
/// The base rule: 1–100 bytes, first and last characters alphanumeric,
/// interior characters alphanumeric, `_`, or `-`. No whitespace, no shell
/// metacharacters, no path separators, no dots. `AgentType` additionally
/// permits interior spaces; `Filename` permits a single trailing `.ext`.
pub fn validate(value: &str, kind: IdKind) -> Result<&str, ValidateError> {
    let (stem, ext) = match kind {
        IdKind::Filename => split_extension(value),
        _ => (value, None),
    };

    if let Some(ext) = ext {
        if ext.is_empty() || ext.len() > MAX_EXT_LEN || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ValidateError::BadExtension { ext: ext.to_string() });
        }
    }

    if stem.is_empty() {
        return Err(ValidateError::Empty { kind });
    }
    if value.len() > MAX_IDENT_LEN {
        return Err(ValidateError::TooLong { kind, len: value.len(), max: MAX_IDENT_LEN });
    }

    let bytes = stem.as_bytes();
    if !bytes[0].is_ascii_alphanumeric() {
        return Err(ValidateError::BadStart { kind, ch: first_char(stem) });
    }
    let last = bytes[bytes.len() - 1];
    if !last.is_ascii_alphanumeric() {
        return Err(ValidateError::BadEnd { kind, ch: last_char(stem) });
    }

    for (pos, ch) in stem.char_indices() {
        let ok = ch.is_ascii_alphanumeric()
            || ch == '_'
            || ch == '-'
            || (ch == ' ' && kind == IdKind::AgentType && pos != 0 && pos != stem.len() - 1);
        if !ok {
            return Err(ValidateError::BadChar { kind, ch, pos });
        }
    }

    Ok(value)
}

/// Split a trailing `.ext` off a filename candidate.
///
/// Only the last dot counts, and only when it is not the first byte; a
/// second dot in the stem still fails the character check above.
fn split_extension(value: &str) -> (&str, Option<&str>) {
    match value.rfind('.') {
        Some(0) | None => (value, None),
        Some(idx) => (&value[..idx], Some(&value[idx + 1..])),
    }
}

fn first_char(s: &str) -> char {
    s.chars().next().unwrap_or('\0')
}

fn last_char(s: &str) -> char {
    s.chars().next_back().unwrap_or('\0')
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
