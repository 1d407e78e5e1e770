// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error type.

use hive_adapters::AdapterError;
use hive_core::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Backend(#[from] AdapterError),

    #[error("record {id} not found")]
    NotFound { id: String },

    #[error("record {id} failed to decode: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {id} failed to encode: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("io failure in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown domain {domain:?}")]
    UnknownDomain { domain: String },
}

impl StorageError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Backend(e) => e.kind(),
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::Decode { .. } | StorageError::Encode { .. } => ErrorKind::PermanentBackend,
            StorageError::Io { .. } => ErrorKind::TransientBackend,
            StorageError::UnknownDomain { .. } => ErrorKind::Validation,
        }
    }
}
