// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! This module provides infrastructure implementations of repository abstractions
//! defined in the domain layer, following the Repository pattern from DDD.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresTenantRepository** / **PostgresAgentRepository** / **PostgresSessionRepository**
//! - **PostgresMessageRepository** - Append-only transcript with insertion sequence
//! - **PostgresIdempotencyRepository** - Reservation and completion of idempotency keys
//! - **PostgresProviderCallRepository** / **PostgresUsageRepository** - Audit and billing ledgers
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for tests and the embedded demo. Each one is
//! a `parking_lot` lock around a collection; locks are never held across an
//! await point.

pub mod postgres_tenant;
pub mod postgres_agent;
pub mod postgres_session;
pub mod postgres_message;
pub mod postgres_idempotency;
pub mod postgres_provider_call;
pub mod postgres_usage;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::billing::UsageRange;
use crate::domain::events::{ProviderCallEvent, UsageEvent};
use crate::domain::idempotency::{IdempotencyRecord, Reservation, ReservationLease};
use crate::domain::repository::{
    AgentRepository, IdempotencyRepository, MessageRepository, ProviderCallRepository,
    RepositoryError, SessionRepository, TenantRepository, UsageRepository,
};
use crate::domain::session::{Message, Session, SessionId};
use crate::domain::tenant::{Tenant, TenantId};
use crate::domain::turn::SendMessageResponse;

#[derive(Clone, Default)]
pub struct InMemoryTenantRepository {
    tenants: Arc<RwLock<HashMap<TenantId, Tenant>>>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn save(&self, tenant: &Tenant) -> Result<(), RepositoryError> {
        self.tenants.write().insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError> {
        Ok(self.tenants.read().get(&id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    agents: Arc<RwLock<HashMap<AgentId, Agent>>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.agents.write().insert(agent.id, agent.clone());
        Ok(())
    }

    async fn find_for_tenant(&self, tenant_id: TenantId, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        let agents = self.agents.read();
        Ok(agents.get(&id).filter(|a| a.tenant_id == tenant_id).cloned())
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Agent>, RepositoryError> {
        let mut agents: Vec<Agent> = self
            .agents
            .read()
            .values()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect();
        agents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(agents)
    }
}

#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        self.sessions.write().insert(session.id, session.clone());
        Ok(())
    }

    async fn find_for_tenant(&self, tenant_id: TenantId, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read();
        Ok(sessions.get(&id).filter(|s| s.tenant_id == tenant_id).cloned())
    }
}

/// Insertion-ordered transcript log
#[derive(Clone, Default)]
pub struct InMemoryMessageRepository {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: &Message) -> Result<(), RepositoryError> {
        self.messages.write().push(message.clone());
        Ok(())
    }

    async fn list_for_session(&self, tenant_id: TenantId, session_id: SessionId) -> Result<Vec<Message>, RepositoryError> {
        let mut messages: Vec<Message> = self
            .messages
            .read()
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.session_id == session_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}

enum IdempotencySlot {
    InFlight {
        request_hash: String,
        token: Uuid,
        expires_at: Instant,
    },
    Completed(IdempotencyRecord),
}

/// Idempotency keys under a single mutex, so reserve/create are atomic
#[derive(Clone, Default)]
pub struct InMemoryIdempotencyRepository {
    slots: Arc<Mutex<HashMap<(TenantId, String), IdempotencySlot>>>,
}

impl InMemoryIdempotencyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyRepository for InMemoryIdempotencyRepository {
    async fn find(&self, tenant_id: TenantId, key: &str) -> Result<Option<IdempotencyRecord>, RepositoryError> {
        let slots = self.slots.lock();
        Ok(match slots.get(&(tenant_id, key.to_string())) {
            Some(IdempotencySlot::Completed(record)) => Some(record.clone()),
            _ => None,
        })
    }

    async fn reserve(
        &self,
        tenant_id: TenantId,
        key: &str,
        request_hash: &str,
        lease: &ReservationLease,
    ) -> Result<Reservation, RepositoryError> {
        let mut slots = self.slots.lock();
        let slot_key = (tenant_id, key.to_string());
        let now = Instant::now();

        match slots.get(&slot_key) {
            Some(IdempotencySlot::Completed(record)) => return Ok(Reservation::Completed(record.clone())),
            Some(IdempotencySlot::InFlight {
                request_hash,
                expires_at,
                ..
            }) if *expires_at > now => {
                return Ok(Reservation::InFlight {
                    request_hash: request_hash.clone(),
                });
            }
            Some(IdempotencySlot::InFlight { .. }) => {
                warn!(idempotency_key = key, "Taking over expired idempotency reservation");
            }
            None => {}
        }

        slots.insert(
            slot_key,
            IdempotencySlot::InFlight {
                request_hash: request_hash.to_string(),
                token: lease.token,
                expires_at: now + lease.ttl,
            },
        );
        Ok(Reservation::Acquired)
    }

    async fn create(
        &self,
        tenant_id: TenantId,
        key: &str,
        request_hash: &str,
        response: &SendMessageResponse,
    ) -> Result<IdempotencyRecord, RepositoryError> {
        let mut slots = self.slots.lock();
        let slot_key = (tenant_id, key.to_string());

        match slots.get(&slot_key) {
            Some(IdempotencySlot::Completed(_)) => {
                return Err(RepositoryError::DuplicateKey(format!("idempotency key '{}' already completed", key)));
            }
            Some(IdempotencySlot::InFlight { request_hash: held, .. }) if held != request_hash => {
                return Err(RepositoryError::DuplicateKey(format!("idempotency key '{}' held by another request", key)));
            }
            _ => {}
        }

        let record = IdempotencyRecord {
            tenant_id,
            key: key.to_string(),
            request_hash: request_hash.to_string(),
            response: response.clone(),
            created_at: Utc::now(),
        };
        slots.insert(slot_key, IdempotencySlot::Completed(record.clone()));
        Ok(record)
    }

    async fn release(&self, tenant_id: TenantId, key: &str, token: Uuid) -> Result<(), RepositoryError> {
        let mut slots = self.slots.lock();
        let slot_key = (tenant_id, key.to_string());
        if matches!(slots.get(&slot_key), Some(IdempotencySlot::InFlight { token: held, .. }) if *held == token) {
            slots.remove(&slot_key);
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProviderCallRepository {
    events: Arc<RwLock<Vec<ProviderCallEvent>>>,
}

impl InMemoryProviderCallRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderCallRepository for InMemoryProviderCallRepository {
    async fn save(&self, event: &ProviderCallEvent) -> Result<(), RepositoryError> {
        self.events.write().push(event.clone());
        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<ProviderCallEvent>, RepositoryError> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUsageRepository {
    events: Arc<RwLock<Vec<UsageEvent>>>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn save(&self, event: &UsageEvent) -> Result<(), RepositoryError> {
        self.events.write().push(event.clone());
        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<UsageEvent>, RepositoryError> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn list_in_range(&self, tenant_id: TenantId, range: &UsageRange) -> Result<Vec<UsageEvent>, RepositoryError> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.tenant_id == tenant_id && range.contains(e.created_at))
            .cloned()
            .collect())
    }
}
