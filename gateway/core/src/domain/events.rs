// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::session::SessionId;
use crate::domain::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Ok,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ok => "ok",
            CallStatus::Error => "error",
        }
    }
}

/// Audit record for one provider chain link (primary or fallback).
///
/// One record summarizes the link's final outcome and accumulated latency
/// across all of its internal retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCallEvent {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub provider: String,
    pub status: CallStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

/// Billing record. Exactly one exists per successfully answered turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub provider: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost_usd: f64,
    pub created_at: DateTime<Utc>,
}

impl UsageEvent {
    pub fn total_tokens(&self) -> u64 {
        u64::from(self.tokens_in) + u64::from(self.tokens_out)
    }
}

/// Unified event type streamed on the in-process event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    ProviderCall(ProviderCallEvent),
    UsageRecorded(UsageEvent),
    IdempotentReplay {
        tenant_id: TenantId,
        idempotency_key: String,
        request_id: String,
        replayed_at: DateTime<Utc>,
    },
}

impl GatewayEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            GatewayEvent::ProviderCall(e) => e.tenant_id,
            GatewayEvent::UsageRecorded(e) => e.tenant_id,
            GatewayEvent::IdempotentReplay { tenant_id, .. } => *tenant_id,
        }
    }
}
