// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Call Auditor - one ProviderCallEvent per provider chain link
//
// Records the final outcome of a chain link (after its internal retries),
// never one event per attempt. Events are persisted first and then
// published on the event bus.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::domain::agent::AgentId;
use crate::domain::events::{CallStatus, EventId, GatewayEvent, ProviderCallEvent};
use crate::domain::llm::ProviderError;
use crate::domain::repository::{ProviderCallRepository, RepositoryError};
use crate::domain::session::SessionId;
use crate::domain::tenant::TenantId;
use crate::infrastructure::event_bus::EventBus;

/// Identity of the turn a provider call belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub request_id: String,
}

pub struct CallAuditor {
    repository: Arc<dyn ProviderCallRepository>,
    event_bus: EventBus,
}

impl CallAuditor {
    pub fn new(repository: Arc<dyn ProviderCallRepository>, event_bus: EventBus) -> Self {
        Self {
            repository,
            event_bus,
        }
    }

    pub async fn record_success(
        &self,
        ctx: &CallContext,
        provider: &str,
        latency_ms: u64,
    ) -> Result<ProviderCallEvent, RepositoryError> {
        self.record(ctx, provider, latency_ms, None).await
    }

    pub async fn record_failure(
        &self,
        ctx: &CallContext,
        provider: &str,
        latency_ms: u64,
        err: &ProviderError,
    ) -> Result<ProviderCallEvent, RepositoryError> {
        self.record(ctx, provider, latency_ms, Some(err.code())).await
    }

    async fn record(
        &self,
        ctx: &CallContext,
        provider: &str,
        latency_ms: u64,
        error_code: Option<String>,
    ) -> Result<ProviderCallEvent, RepositoryError> {
        let event = ProviderCallEvent {
            id: EventId::new(),
            tenant_id: ctx.tenant_id,
            session_id: ctx.session_id,
            agent_id: ctx.agent_id,
            provider: provider.to_string(),
            status: if error_code.is_some() { CallStatus::Error } else { CallStatus::Ok },
            latency_ms,
            error_code,
            request_id: ctx.request_id.clone(),
            created_at: Utc::now(),
        };

        self.repository.save(&event).await?;
        debug!(
            provider,
            status = event.status.as_str(),
            latency_ms,
            request_id = %ctx.request_id,
            "Provider call audited"
        );
        self.event_bus.publish(GatewayEvent::ProviderCall(event.clone()));
        Ok(event)
    }
}
