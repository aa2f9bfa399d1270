// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Message Gateway Use Case
//!
//! Application service for a single conversation turn (`sendMessage`).
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Orchestrate idempotency, transcript, provider chain and billing
//! - **Collaborators:**
//!   - Domain: Session, Agent, Message, IdempotencyRecord
//!   - Application: FallbackRouter, UsageMeter
//!   - Infrastructure: repositories, ProviderRegistry, EventBus
//!
//! # Turn lifecycle
//!
//! ```text
//! validate -> load session/agent -> idempotency lookup -> {replay | conflict | proceed}
//! proceed -> reserve key -> user message -> provider chain -> assistant message
//!         -> usage event -> idempotency record -> response
//! ```
//!
//! The user message is written before the provider call and survives a
//! failed turn. The assistant message, usage event and idempotency record
//! are written only after a successful reply.
//!
//! A reservation held by a turn that fails before billing is released so the
//! key can be retried; a cancelled turn releases it from its drop guard. Once
//! the usage event is written the reservation is never released: if the
//! record cannot be stored the key stays reserved until its lease expires,
//! so client retries cannot bill the same turn twice.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::audit::{CallAuditor, CallContext};
use crate::application::fallback::FallbackRouter;
use crate::application::repository_factory::GatewayRepositories;
use crate::application::usage_meter::UsageMeter;
use crate::domain::agent::Agent;
use crate::domain::billing::PriceTable;
use crate::domain::errors::GatewayError;
use crate::domain::events::GatewayEvent;
use crate::domain::gateway_config::{GatewayConfigManifest, IdempotencyConfig};
use crate::domain::idempotency::{request_hash, IdempotencyRecord, Reservation, ReservationLease};
use crate::domain::llm::ChatMessage;
use crate::domain::reliability::RetryPolicy;
use crate::domain::repository::{
    AgentRepository, IdempotencyRepository, MessageRepository, RepositoryError, SessionRepository,
};
use crate::domain::session::{Message, Role};
use crate::domain::tenant::TenantId;
use crate::domain::turn::{SendMessageRequest, SendMessageResponse};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::llm::ProviderRegistry;

/// Message Gateway Use Case
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Run one conversation turn
    ///
    /// # Errors
    ///
    /// - `MISSING_IDEMPOTENCY_KEY` / `BAD_REQUEST`: invalid input
    /// - `SESSION_NOT_FOUND` / `AGENT_NOT_FOUND`: absent or owned by another tenant
    /// - `BAD_PROVIDER`: agent references an unregistered provider
    /// - `IDEMPOTENCY_CONFLICT`: key reused with a different payload
    /// - `IDEMPOTENCY_IN_PROGRESS`: key still held by a concurrent request
    /// - `PROVIDER_UNAVAILABLE`: every provider in the chain failed
    async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse, GatewayError>;
}

/// How long a request waits on a key held by a concurrent identical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyWait {
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for IdempotencyWait {
    fn default() -> Self {
        Self::from(&IdempotencyConfig::default())
    }
}

impl From<&IdempotencyConfig> for IdempotencyWait {
    fn from(config: &IdempotencyConfig) -> Self {
        Self {
            max_wait: Duration::from_millis(config.in_flight_wait_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        }
    }
}

/// Chain links a turn may run: primary plus one fallback
const CHAIN_DEPTH: u32 = 2;

/// Storage attempts for the completed idempotency record
const COMPLETE_ATTEMPTS: u32 = 3;

/// Reservation lifetime: twice the longest a full provider chain can take
pub fn reservation_ttl(policy: &RetryPolicy) -> Duration {
    policy.link_budget().saturating_mul(CHAIN_DEPTH * 2)
}

/// Releases an acquired reservation unless the turn has been billed.
///
/// Dropping an armed guard (the turn future was cancelled) releases the
/// reservation on a background task.
struct ReservationGuard {
    idempotency: Arc<dyn IdempotencyRepository>,
    tenant_id: TenantId,
    key: String,
    token: Uuid,
    armed: bool,
}

impl ReservationGuard {
    fn new(
        idempotency: Arc<dyn IdempotencyRepository>,
        tenant_id: TenantId,
        key: &str,
        lease: &ReservationLease,
    ) -> Self {
        Self {
            idempotency,
            tenant_id,
            key: key.to_string(),
            token: lease.token,
            armed: true,
        }
    }

    /// The turn is billed; the key must not become reservable again
    fn disarm(&mut self) {
        self.armed = false;
    }

    async fn release(mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Err(err) = self.idempotency.release(self.tenant_id, &self.key, self.token).await {
            warn!(idempotency_key = %self.key, error = %err, "Failed to release idempotency reservation");
        }
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let idempotency = self.idempotency.clone();
        let tenant_id = self.tenant_id;
        let key = std::mem::take(&mut self.key);
        let token = self.token;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = idempotency.release(tenant_id, &key, token).await {
                        warn!(idempotency_key = %key, error = %err, "Failed to release abandoned reservation");
                    }
                });
            }
            Err(_) => {
                warn!(idempotency_key = %key, "No runtime to release abandoned reservation; it expires with its lease");
            }
        }
    }
}

/// Standard implementation of MessageGateway
pub struct StandardMessageGateway {
    sessions: Arc<dyn SessionRepository>,
    agents: Arc<dyn AgentRepository>,
    messages: Arc<dyn MessageRepository>,
    idempotency: Arc<dyn IdempotencyRepository>,
    registry: Arc<ProviderRegistry>,
    router: FallbackRouter,
    meter: UsageMeter,
    event_bus: EventBus,
    wait: IdempotencyWait,
    reservation_ttl: Duration,
}

impl StandardMessageGateway {
    pub fn new(
        repositories: &GatewayRepositories,
        registry: Arc<ProviderRegistry>,
        prices: PriceTable,
        policy: RetryPolicy,
        event_bus: EventBus,
    ) -> Self {
        let auditor = CallAuditor::new(repositories.provider_calls.clone(), event_bus.clone());
        let reservation_ttl = reservation_ttl(&policy);
        Self {
            sessions: repositories.sessions.clone(),
            agents: repositories.agents.clone(),
            messages: repositories.messages.clone(),
            idempotency: repositories.idempotency.clone(),
            router: FallbackRouter::new(registry.clone(), policy, auditor),
            meter: UsageMeter::new(prices, repositories.usage.clone(), event_bus.clone()),
            registry,
            event_bus,
            wait: IdempotencyWait::default(),
            reservation_ttl,
        }
    }

    /// Gateway wired from a validated configuration manifest
    pub fn from_config(
        config: &GatewayConfigManifest,
        repositories: &GatewayRepositories,
        registry: Arc<ProviderRegistry>,
        event_bus: EventBus,
    ) -> Self {
        Self::new(
            repositories,
            registry,
            config.price_table(),
            config.spec.reliability.retry_policy(),
            event_bus,
        )
        .with_idempotency_wait(IdempotencyWait::from(&config.spec.idempotency))
    }

    pub fn with_idempotency_wait(mut self, wait: IdempotencyWait) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// Every provider the agent may route to must be registered and priced
    fn check_providers(&self, agent: &Agent) -> Result<(), GatewayError> {
        for provider in agent.provider_chain() {
            if !self.registry.contains(provider) {
                warn!(agent_id = %agent.id, provider, "Agent references unknown provider");
                return Err(GatewayError::BadProvider(provider.to_string()));
            }
            self.meter.ensure_priced(provider)?;
        }
        Ok(())
    }

    /// Stored response for a completed key, or `Conflict` when the payload differs
    fn replay(
        &self,
        record: IdempotencyRecord,
        hash: &str,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, GatewayError> {
        if record.request_hash != hash {
            warn!(
                tenant_id = %request.tenant_id,
                idempotency_key = %record.key,
                request_id = %request.request_id,
                "Idempotency key reused with a different payload"
            );
            return Err(GatewayError::Conflict);
        }

        info!(
            tenant_id = %request.tenant_id,
            idempotency_key = %record.key,
            request_id = %request.request_id,
            "Replaying stored response"
        );
        self.event_bus.publish(GatewayEvent::IdempotentReplay {
            tenant_id: request.tenant_id,
            idempotency_key: record.key,
            request_id: request.request_id.clone(),
            replayed_at: Utc::now(),
        });
        Ok(record.response)
    }

    /// Take the key or resolve to the outcome of whoever holds it
    async fn acquire(
        &self,
        key: &str,
        hash: &str,
        lease: &ReservationLease,
        request: &SendMessageRequest,
    ) -> Result<Option<SendMessageResponse>, GatewayError> {
        let deadline = tokio::time::Instant::now() + self.wait.max_wait;

        loop {
            match self.idempotency.reserve(request.tenant_id, key, hash, lease).await? {
                Reservation::Acquired => return Ok(None),
                Reservation::Completed(record) => return self.replay(record, hash, request).map(Some),
                Reservation::InFlight { request_hash } if request_hash != hash => {
                    warn!(
                        tenant_id = %request.tenant_id,
                        idempotency_key = key,
                        "Idempotency key in flight with a different payload"
                    );
                    return Err(GatewayError::Conflict);
                }
                Reservation::InFlight { .. } => {
                    if tokio::time::Instant::now() >= deadline {
                        warn!(
                            tenant_id = %request.tenant_id,
                            idempotency_key = key,
                            waited_ms = self.wait.max_wait.as_millis() as u64,
                            "Gave up waiting for in-flight request"
                        );
                        return Err(GatewayError::InProgress);
                    }
                    tokio::time::sleep(self.wait.poll_interval).await;
                }
            }
        }
    }

    /// The billed part of a turn; runs only while holding the key's reservation
    async fn run_turn(
        &self,
        agent: &Agent,
        ctx: &CallContext,
        key: &str,
        hash: &str,
        request: &SendMessageRequest,
        guard: &mut ReservationGuard,
    ) -> Result<SendMessageResponse, GatewayError> {
        let user_message = Message::new(ctx.tenant_id, ctx.session_id, Role::User, request.content.clone());
        self.messages.append(&user_message).await?;

        let transcript = self.messages.list_for_session(ctx.tenant_id, ctx.session_id).await?;
        let context: Vec<ChatMessage> = std::iter::once(ChatMessage::new(Role::System, agent.system_prompt.clone()))
            .chain(transcript.into_iter().map(|m| ChatMessage::new(m.role, m.content)))
            .collect();

        let routed = self.router.route(agent, ctx, &context).await?;

        let assistant_message = Message::new(
            ctx.tenant_id,
            ctx.session_id,
            Role::Assistant,
            routed.completion.text.clone(),
        );
        self.messages.append(&assistant_message).await?;

        let usage = self
            .meter
            .record(ctx, &routed.provider, routed.completion.tokens_in, routed.completion.tokens_out)
            .await?;
        guard.disarm();

        let response = SendMessageResponse {
            reply: routed.completion.text,
            provider: routed.provider,
            tokens_in: usage.tokens_in,
            tokens_out: usage.tokens_out,
            cost_usd: usage.cost_usd,
            latency_ms: routed.latency_ms,
            fallback_used: routed.fallback_used,
            assistant_message_id: assistant_message.id,
            request_id: request.request_id.clone(),
        };

        self.complete(ctx, key, hash, request, response).await
    }

    /// Store the completed record, retrying storage failures a bounded number
    /// of times. A key completed concurrently resolves to that stored response.
    async fn complete(
        &self,
        ctx: &CallContext,
        key: &str,
        hash: &str,
        request: &SendMessageRequest,
        response: SendMessageResponse,
    ) -> Result<SendMessageResponse, GatewayError> {
        let mut attempt = 1;
        loop {
            match self.idempotency.create(ctx.tenant_id, key, hash, &response).await {
                Ok(_) => return Ok(response),
                Err(RepositoryError::DuplicateKey(detail)) => {
                    warn!(idempotency_key = key, %detail, "Idempotency key completed concurrently, re-reading");
                    return match self.idempotency.find(ctx.tenant_id, key).await? {
                        Some(record) => self.replay(record, hash, request),
                        None => Err(RepositoryError::DuplicateKey(detail).into()),
                    };
                }
                Err(err) if attempt < COMPLETE_ATTEMPTS => {
                    warn!(
                        idempotency_key = key,
                        attempt,
                        error = %err,
                        request_id = %ctx.request_id,
                        "Failed to store idempotency record, retrying"
                    );
                    tokio::time::sleep(self.wait.poll_interval).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        idempotency_key = key,
                        error = %err,
                        request_id = %ctx.request_id,
                        "Billed turn could not be recorded; key stays reserved until its lease expires"
                    );
                    return Err(err.into());
                }
            }
        }
    }
}

#[async_trait]
impl MessageGateway for StandardMessageGateway {
    async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse, GatewayError> {
        // Step 1: Validate input
        let key = match request.idempotency_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key.to_string(),
            _ => return Err(GatewayError::missing_idempotency_key()),
        };
        if request.content.trim().is_empty() {
            return Err(GatewayError::bad_request("content required"));
        }

        // Step 2: Resolve session and agent strictly within the tenant
        let session = self
            .sessions
            .find_for_tenant(request.tenant_id, request.session_id)
            .await?
            .ok_or_else(GatewayError::session_not_found)?;
        let agent = self
            .agents
            .find_for_tenant(request.tenant_id, session.agent_id)
            .await?
            .ok_or_else(GatewayError::agent_not_found)?;

        // Step 3: Replay or conflict on a completed key
        let hash = request_hash(&session.id, &agent.id, &request.content);
        if let Some(record) = self.idempotency.find(request.tenant_id, &key).await? {
            return self.replay(record, &hash, &request);
        }

        // Step 4: Refuse before any side effect if the chain cannot be served or billed
        self.check_providers(&agent)?;

        // Step 5: Take the key
        let lease = ReservationLease::new(self.reservation_ttl);
        if let Some(response) = self.acquire(&key, &hash, &lease, &request).await? {
            return Ok(response);
        }
        let mut guard = ReservationGuard::new(self.idempotency.clone(), request.tenant_id, &key, &lease);

        let ctx = CallContext {
            tenant_id: request.tenant_id,
            session_id: session.id,
            agent_id: agent.id,
            request_id: request.request_id.clone(),
        };

        // Step 6: Run the billed turn, releasing the key on an unbilled failure
        match self.run_turn(&agent, &ctx, &key, &hash, &request, &mut guard).await {
            Ok(response) => {
                info!(
                    tenant_id = %ctx.tenant_id,
                    session_id = %ctx.session_id,
                    provider = %response.provider,
                    fallback_used = response.fallback_used,
                    latency_ms = response.latency_ms,
                    request_id = %ctx.request_id,
                    "Turn completed"
                );
                Ok(response)
            }
            Err(err) => {
                guard.release().await;
                warn!(
                    tenant_id = %ctx.tenant_id,
                    session_id = %ctx.session_id,
                    code = err.code(),
                    request_id = %ctx.request_id,
                    "Turn failed"
                );
                Err(err)
            }
        }
    }
}
