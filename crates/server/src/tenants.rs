// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant resolution.
//!
//! Maps an inbound credential to a tenant id. With auth disabled, every
//! request is the `default` tenant; with auth enabled, an unknown or
//! missing credential is rejected before anything else runs.

use parking_lot::RwLock;
use std::collections::HashMap;

use hive_core::config::AuthConfig;
use hive_core::TenantId;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ResolveError {
    #[error("unknown credential")]
    Unauthorized,

    #[error("credential maps to an invalid tenant id: {0}")]
    BadTenant(String),
}

pub struct TenantResolver {
    auth: AuthConfig,
    /// Validated credential → tenant lookups, built lazily.
    cache: RwLock<HashMap<String, TenantId>>,
}

impl TenantResolver {
    pub fn new(auth: AuthConfig) -> Self {
        Self { auth, cache: RwLock::new(HashMap::new()) }
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth.enabled
    }

    pub fn resolve(&self, credential: Option<&str>) -> Result<TenantId, ResolveError> {
        if !self.auth.enabled {
            return Ok(TenantId::default_tenant());
        }
        let Some(credential) = credential else {
            return Err(ResolveError::Unauthorized);
        };
        if let Some(tenant) = self.cache.read().get(credential) {
            return Ok(tenant.clone());
        }
        let Some(name) = self.auth.keys.get(credential) else {
            return Err(ResolveError::Unauthorized);
        };
        let tenant = TenantId::new(name.clone())
            .map_err(|e| ResolveError::BadTenant(e.to_string()))?;
        self.cache.write().insert(credential.to_string(), tenant.clone());
        Ok(tenant)
    }
}

#[cfg(test)]
#[path = "tenants_tests.rs"]
mod tests;
