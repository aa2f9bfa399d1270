// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each vendor adapter translates the vendor's raw response body into the
// domain `ChatCompletion`. Where the body comes from is abstracted behind
// `UpstreamTransport`, so the same adapter runs against a simulated
// upstream in demos and a network client in a deployment.

use async_trait::async_trait;

use crate::domain::llm::{ChatMessage, ProviderError};

pub mod vendor_a;
pub mod vendor_b;
pub mod simulated;
pub mod scripted;
pub mod registry;

pub use registry::ProviderRegistry;
pub use scripted::ScriptedProvider;
pub use simulated::SimulatedUpstream;
pub use vendor_a::VendorAAdapter;
pub use vendor_b::VendorBAdapter;

/// Source of raw vendor response bodies
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Send the model context upstream and return the undecoded JSON body
    async fn send(&self, messages: &[ChatMessage]) -> Result<serde_json::Value, ProviderError>;
}
