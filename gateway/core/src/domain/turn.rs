// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use crate::domain::session::{MessageId, SessionId};
use crate::domain::tenant::TenantId;

/// Inbound conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub content: String,
    /// Required; `None` or empty fails with `MISSING_IDEMPOTENCY_KEY`
    pub idempotency_key: Option<String>,
    pub request_id: String,
}

/// Reply to a turn. Stored verbatim as the idempotent response for its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub reply: String,
    pub provider: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub fallback_used: bool,
    pub assistant_message_id: MessageId,
    pub request_id: String,
}
