// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Usage Meter - prices a billed turn and persists its UsageEvent
//
// Exactly one UsageEvent is written per successful turn, for the provider
// that actually answered. Failed attempts are not billed.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::application::audit::CallContext;
use crate::domain::billing::PriceTable;
use crate::domain::errors::GatewayError;
use crate::domain::events::{EventId, GatewayEvent, UsageEvent};
use crate::domain::repository::UsageRepository;
use crate::infrastructure::event_bus::EventBus;

pub struct UsageMeter {
    prices: PriceTable,
    repository: Arc<dyn UsageRepository>,
    event_bus: EventBus,
}

impl UsageMeter {
    pub fn new(prices: PriceTable, repository: Arc<dyn UsageRepository>, event_bus: EventBus) -> Self {
        Self {
            prices,
            repository,
            event_bus,
        }
    }

    /// `(tokens_in + tokens_out) / 1000 * price_per_1k(provider)`
    pub fn cost(&self, provider: &str, tokens_in: u32, tokens_out: u32) -> Result<f64, GatewayError> {
        self.prices.cost(provider, tokens_in, tokens_out)
    }

    /// Fails with `CONFIGURATION_ERROR` when `provider` has no price
    pub fn ensure_priced(&self, provider: &str) -> Result<(), GatewayError> {
        self.prices.price_per_1k(provider).map(|_| ())
    }

    pub async fn record(
        &self,
        ctx: &CallContext,
        provider: &str,
        tokens_in: u32,
        tokens_out: u32,
    ) -> Result<UsageEvent, GatewayError> {
        let cost_usd = self.cost(provider, tokens_in, tokens_out)?;
        let event = UsageEvent {
            id: EventId::new(),
            tenant_id: ctx.tenant_id,
            session_id: ctx.session_id,
            agent_id: ctx.agent_id,
            provider: provider.to_string(),
            tokens_in,
            tokens_out,
            cost_usd,
            created_at: Utc::now(),
        };

        self.repository.save(&event).await?;
        info!(
            tenant_id = %ctx.tenant_id,
            session_id = %ctx.session_id,
            provider,
            tokens = event.total_tokens(),
            cost_usd,
            "Usage recorded"
        );
        self.event_bus.publish(GatewayEvent::UsageRecorded(event.clone()));
        Ok(event)
    }
}
