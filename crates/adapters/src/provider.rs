// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable LLM text-completion interface.
//!
//! The orchestrator only needs `generate(prompt, model, max_tokens)` and a
//! usage report back. `HttpProvider` speaks an Anthropic-style messages
//! endpoint; `ScriptedProvider` answers from a queue for tests.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-support"))]
use parking_lot::Mutex;
use serde_json::json;
#[cfg(any(test, feature = "test-support"))]
use std::collections::VecDeque;

use hive_core::config::ProviderConfig;

use crate::error::AdapterError;
use crate::Result;

/// Token accounting for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One completed generation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Generation {
    pub text: String,
    pub usage: Usage,
    pub model: String,
}

/// A generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub system: Option<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Default::default() }
    }

    hive_core::setters! {
        option {
            model: String,
            system: String,
        }
    }

    pub fn max_tokens(mut self, v: u32) -> Self {
        self.max_tokens = Some(v);
        self
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation>;
}

// ── HTTP implementation ─────────────────────────────────────────────────

/// Anthropic-style messages endpoint client. The API key is resolved from
/// the environment variable named in config; the value itself never lands
/// in a config file or spawn spec.
pub struct HttpProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    api_key: String,
}

impl HttpProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AdapterError::Provider(format!("{} not set", config.api_key_env))
        })?;
        Ok(Self { client: reqwest::Client::new(), config, api_key })
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation> {
        let model = request.model.unwrap_or_else(|| self.config.model.clone());
        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
        });
        if let Some(system) = request.system {
            body["system"] = json!(system);
        }

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Provider(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Provider(format!("provider returned {status}: {body}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Provider(format!("bad provider response: {e}")))?;

        let text = payload["content"][0]["text"].as_str().unwrap_or_default().to_string();
        if text.is_empty() {
            return Err(AdapterError::Provider("provider response had no text content".into()));
        }
        let usage = Usage {
            input_tokens: payload["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: payload["usage"]["output_tokens"].as_u64().unwrap_or(0),
        };
        Ok(Generation { text, usage, model })
    }
}

// ── Scripted implementation (tests) ─────────────────────────────────────

/// Answers generations from a queue; records the prompts it saw.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<Generation>>>,
    prompts: Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let text = text.into();
        let tokens = (text.len() / 4).max(1) as u64;
        self.responses.lock().push_back(Ok(Generation {
            text,
            usage: Usage { input_tokens: 10, output_tokens: tokens },
            model: "scripted".to_string(),
        }));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.responses.lock().push_back(Err(AdapterError::Provider(message.into())));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Provider for ScriptedProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation> {
        self.prompts.lock().push(request.prompt.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AdapterError::Provider("scripted provider exhausted".into())))
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
