// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// VendorB Provider Adapter
//
// Anti-Corruption Layer for the VendorB chat-completions response shape:
// `{ choices: [{ message: { content } }], usage?: { input_tokens, output_tokens }, latencyMs }`

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::UpstreamTransport;
use crate::domain::llm::{
    estimate_tokens, last_content, ChatCompletion, ChatMessage, ProviderAdapter, ProviderError,
};

pub struct VendorBAdapter {
    name: String,
    upstream: Arc<dyn UpstreamTransport>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorBResponse {
    #[serde(default)]
    choices: Vec<VendorBChoice>,
    #[serde(default)]
    usage: Option<VendorBUsage>,
    #[serde(default)]
    latency_ms: Option<u64>,
}

#[derive(Deserialize)]
struct VendorBChoice {
    message: VendorBMessage,
}

#[derive(Deserialize)]
struct VendorBMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct VendorBUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

impl VendorBAdapter {
    pub fn new(name: impl Into<String>, upstream: Arc<dyn UpstreamTransport>) -> Self {
        Self {
            name: name.into(),
            upstream,
        }
    }
}

#[async_trait]
impl ProviderAdapter for VendorBAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError> {
        let body = self.upstream.send(messages).await?;
        let response: VendorBResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse VendorB response: {}", e)))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let (input_tokens, output_tokens) = response
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((None, None));

        Ok(ChatCompletion {
            tokens_in: input_tokens.unwrap_or_else(|| estimate_tokens(last_content(messages))),
            tokens_out: output_tokens.unwrap_or_else(|| estimate_tokens(&text)),
            text,
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

    async fn chat(body: serde_json::Value, last: &str) -> ChatCompletion {
        VendorBAdapter::new("vendorB", Arc::new(FixedBody(body)))
            .chat(&[ChatMessage::new(Role::User, last)])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_normalizes_choices_shape() {
        let completion = chat(
            json!({
                "choices": [{ "message": { "content": "VendorB reply: Hi" } }],
                "usage": { "input_tokens": 3, "output_tokens": 9 },
                "latencyMs": 210
            }),
            "Hi",
        )
        .await;

        assert_eq!(completion.text, "VendorB reply: Hi");
        assert_eq!((completion.tokens_in, completion.tokens_out), (3, 9));
        assert_eq!(completion.latency_ms, 210);
    }

    #[tokio::test]
    async fn test_partial_usage_is_estimated() {
        let completion = chat(
            json!({
                "choices": [{ "message": { "content": "abcdefgh" } }],
                "usage": { "input_tokens": 5 }
            }),
            "ignored",
        )
        .await;

        assert_eq!(completion.tokens_in, 5);
        assert_eq!(completion.tokens_out, 2);
    }

    #[tokio::test]
    async fn test_empty_choices_yield_empty_text() {
        let completion = chat(json!({ "choices": [] }), "abcd").await;
        assert_eq!(completion.text, "");
        assert_eq!(completion.tokens_in, 1);
        assert_eq!(completion.tokens_out, 1);
    }
}
