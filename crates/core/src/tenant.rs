// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant identifier.
//!
//! Every other ID in the system is scoped by tenant, implicitly (directory
//! prefixes) or explicitly (record columns). Tenant IDs are operator-assigned,
//! not generated, so this is a plain validated string rather than a nanoid.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::validate::{validate, IdKind, ValidateError};

/// The reserved tenant used when authentication is disabled.
pub const DEFAULT_TENANT: &str = "default";

/// Unique identifier for an isolation scope (workspace + state partition).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidateError> {
        let id = id.into();
        validate(&id, IdKind::Tenant)?;
        Ok(Self(id))
    }

    /// The reserved `default` tenant.
    pub fn default_tenant() -> Self {
        Self(DEFAULT_TENANT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_TENANT
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for TenantId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TenantId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for TenantId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "tenant_tests.rs"]
mod tests;
