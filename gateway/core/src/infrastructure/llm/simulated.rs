// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Simulated Upstream Vendors
//
// In-process stand-ins for the real vendor endpoints. They reply in the
// vendor's own wire shape and inject failures and latency according to a
// `FaultConfig`, so the reliability path (timeout, retry, fallback) can be
// exercised without network access.

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::UpstreamTransport;
use crate::domain::gateway_config::{FaultConfig, ProviderType};
use crate::domain::llm::{estimate_tokens, last_content, ChatMessage, ProviderError};

pub struct SimulatedUpstream {
    kind: ProviderType,
    faults: FaultConfig,
}

/// Outcome drawn for one call before any await point
enum Draw {
    Fail { retry_after_ms: u64 },
    Reply { latency_ms: u64 },
}

impl SimulatedUpstream {
    pub fn new(kind: ProviderType, faults: FaultConfig) -> Self {
        Self { kind, faults }
    }

    /// Upstream with the vendor's default fault profile
    pub fn with_default_faults(kind: ProviderType) -> Self {
        let faults = match kind {
            ProviderType::VendorA => FaultConfig::vendor_a_default(),
            ProviderType::VendorB => FaultConfig::vendor_b_default(),
        };
        Self::new(kind, faults)
    }

    fn draw(&self) -> Draw {
        let mut rng = rand::rng();
        if rng.random_bool(self.faults.failure_rate.clamp(0.0, 1.0)) {
            return Draw::Fail {
                retry_after_ms: sample(&mut rng, self.faults.retry_after_ms),
            };
        }

        let range = if rng.random_bool(self.faults.slow_rate.clamp(0.0, 1.0)) {
            self.faults.slow_latency_ms
        } else {
            self.faults.latency_ms
        };
        Draw::Reply {
            latency_ms: sample(&mut rng, range),
        }
    }

    fn failure(&self, retry_after_ms: u64) -> ProviderError {
        match self.kind {
            ProviderType::VendorA => ProviderError::http(500, "VendorA internal error"),
            ProviderType::VendorB => ProviderError::rate_limited(Some(retry_after_ms)),
        }
    }

    fn body(&self, last: &str, latency_ms: u64) -> serde_json::Value {
        match self.kind {
            ProviderType::VendorA => {
                let output_text = format!("VendorA reply: {}", last);
                json!({
                    "outputText": output_text,
                    "tokensIn": estimate_tokens(last),
                    "tokensOut": estimate_tokens(&output_text),
                    "latencyMs": latency_ms,
                })
            }
            ProviderType::VendorB => {
                let content = format!("VendorB reply: {}", last);
                json!({
                    "choices": [{ "message": { "content": content } }],
                    "usage": {
                        "input_tokens": estimate_tokens(last),
                        "output_tokens": estimate_tokens(&content),
                    },
                    "latencyMs": latency_ms,
                })
            }
        }
    }
}

/// Uniform sample from an inclusive `(min, max)` range; degenerate ranges yield `min`
fn sample(rng: &mut impl Rng, (min, max): (u64, u64)) -> u64 {
    if max <= min {
        min
    } else {
        rng.random_range(min..=max)
    }
}

#[async_trait]
impl UpstreamTransport for SimulatedUpstream {
    async fn send(&self, messages: &[ChatMessage]) -> Result<serde_json::Value, ProviderError> {
        match self.draw() {
            Draw::Fail { retry_after_ms } => {
                let err = self.failure(retry_after_ms);
                debug!(kind = ?self.kind, error = %err, "Simulated upstream failure");
                Err(err)
            }
            Draw::Reply { latency_ms } => {
                tokio::time::sleep(Duration::from_millis(latency_ms)).await;
                Ok(self.body(last_content(messages), latency_ms))
            }
        }
    }
}
