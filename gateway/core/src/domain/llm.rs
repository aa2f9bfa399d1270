// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provider capability consumed by the gateway.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-Corruption Layer between the gateway and upstream model vendors

// Every upstream vendor is wrapped by an adapter that normalizes its response
// shape into a `ChatCompletion`. Adapters live in infrastructure/llm/ and are
// looked up by provider identifier through the `ProviderRegistry`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::session::Role;

/// Domain interface for upstream model providers
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider identifier this adapter is registered under (e.g. "vendorA")
    fn name(&self) -> &str;

    /// Run one chat completion over the full model context
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError>;
}

/// One entry of the model context sent upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Normalized upstream reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletion {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    /// Latency reported by the upstream itself (0 when unknown)
    pub latency_ms: u64,
}

/// Errors raised by a single upstream call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        /// Explicit retry-after hint carried by 429 responses
        retry_after_ms: Option<u64>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            retry_after_ms: None,
        }
    }

    pub fn rate_limited(retry_after_ms: Option<u64>) -> Self {
        Self::Http {
            status: 429,
            message: "rate limited".to_string(),
            retry_after_ms,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Timeout => 408,
            Self::Http { status, .. } => *status,
            Self::Network(_) | Self::Malformed(_) => 502,
        }
    }

    /// Error code recorded on the provider call audit trail
    pub fn code(&self) -> String {
        match self {
            Self::Timeout => "TIMEOUT".to_string(),
            Self::Http { status, .. } => format!("HTTP_{}", status),
            Self::Network(_) => "NETWORK_ERROR".to_string(),
            Self::Malformed(_) => "MALFORMED_RESPONSE".to_string(),
        }
    }

    /// Transient iff a timeout, an HTTP 500, or an HTTP 429
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout)
            || matches!(self, Self::Http { status: 500 | 429, .. })
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::Http {
                status: 429,
                retry_after_ms,
                ..
            } => *retry_after_ms,
            _ => None,
        }
    }
}

/// Token estimate used when a vendor omits usage counts: `max(1, chars / 4)`
pub fn estimate_tokens(text: &str) -> u32 {
    let estimate = text.chars().count() / 4;
    u32::try_from(estimate).unwrap_or(u32::MAX).max(1)
}

/// Content of the last input message, or "" for an empty context
pub fn last_content(messages: &[ChatMessage]) -> &str {
    messages.last().map(|m| m.content.as_str()).unwrap_or_default()
}
