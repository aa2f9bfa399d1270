// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// VendorA Provider Adapter
//
// Anti-Corruption Layer for the VendorA flat response shape:
// `{ outputText, tokensIn?, tokensOut?, latencyMs }`

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::UpstreamTransport;
use crate::domain::llm::{
    estimate_tokens, last_content, ChatCompletion, ChatMessage, ProviderAdapter, ProviderError,
};

pub struct VendorAAdapter {
    name: String,
    upstream: Arc<dyn UpstreamTransport>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorAResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    tokens_in: Option<u32>,
    #[serde(default)]
    tokens_out: Option<u32>,
    #[serde(default)]
    latency_ms: Option<u64>,
}

impl VendorAAdapter {
    pub fn new(name: impl Into<String>, upstream: Arc<dyn UpstreamTransport>) -> Self {
        Self {
            name: name.into(),
            upstream,
        }
    }
}

#[async_trait]
impl ProviderAdapter for VendorAAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError> {
        let body = self.upstream.send(messages).await?;
        let response: VendorAResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse VendorA response: {}", e)))?;

        let text = response.output_text.unwrap_or_default();
        let tokens_in = response
            .tokens_in
            .unwrap_or_else(|| estimate_tokens(last_content(messages)));
        let tokens_out = response.tokens_out.unwrap_or_else(|| estimate_tokens(&text));

        Ok(ChatCompletion {
            text,
            tokens_in,
            tokens_out,
            latency_ms: response.latency_ms.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::Role;
    use serde_json::json;

    struct FixedBody(serde_json::Value);

    #[async_trait]
    impl UpstreamTransport for FixedBody {
        async fn send(&self, _messages: &[ChatMessage]) -> Result<serde_json::Value, ProviderError> {
            Ok(self.0.clone())
        }
    }

    fn adapter(body: serde_json::Value) -> VendorAAdapter {
        VendorAAdapter::new("vendorA", Arc::new(FixedBody(body)))
    }

    #[tokio::test]
    async fn test_normalizes_reported_usage() {
        let messages = vec![ChatMessage::new(Role::User, "Hello")];
        let completion = adapter(json!({
            "outputText": "VendorA reply: Hello",
            "tokensIn": 7,
            "tokensOut": 11,
            "latencyMs": 150
        }))
        .chat(&messages)
        .await
        .unwrap();

        assert_eq!(completion.text, "VendorA reply: Hello");
        assert_eq!(completion.tokens_in, 7);
        assert_eq!(completion.tokens_out, 11);
        assert_eq!(completion.latency_ms, 150);
    }

    #[tokio::test]
    async fn test_estimates_missing_usage() {
        let messages = vec![
            ChatMessage::new(Role::System, "a very long system prompt that is not counted"),
            ChatMessage::new(Role::User, "12345678"),
        ];
        let completion = adapter(json!({ "outputText": "abcdefghijkl" }))
            .chat(&messages)
            .await
            .unwrap();

        assert_eq!(completion.tokens_in, 2);
        assert_eq!(completion.tokens_out, 3);
        assert_eq!(completion.latency_ms, 0);
    }

    #[tokio::test]
    async fn test_rejects_malformed_body() {
        let err = adapter(json!({ "outputText": 42 }))
            .chat(&[ChatMessage::new(Role::User, "hi")])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MALFORMED_RESPONSE");
        assert!(!err.is_transient());
    }
}
