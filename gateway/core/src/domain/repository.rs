// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate, following the DDD Repository
//! pattern: one repository per aggregate, interface defined in the domain layer,
//! implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `TenantRepository` | `Tenant` | `InMemoryTenantRepository`, `PostgresTenantRepository` |
//! | `AgentRepository` | `Agent` | `InMemoryAgentRepository`, `PostgresAgentRepository` |
//! | `SessionRepository` | `Session` | `InMemorySessionRepository`, `PostgresSessionRepository` |
//! | `MessageRepository` | `Message` | `InMemoryMessageRepository`, `PostgresMessageRepository` |
//! | `IdempotencyRepository` | `IdempotencyRecord` | `InMemoryIdempotencyRepository`, `PostgresIdempotencyRepository` |
//! | `ProviderCallRepository` | `ProviderCallEvent` | `InMemoryProviderCallRepository`, `PostgresProviderCallRepository` |
//! | `UsageRepository` | `UsageEvent` | `InMemoryUsageRepository`, `PostgresUsageRepository` |
//!
//! Every read is scoped by `TenantId`. An entity owned by another tenant is
//! reported exactly like an absent one (`Ok(None)`).
//!
//! The store is the only shared mutable resource between concurrent requests,
//! so `IdempotencyRepository::reserve` and `create` must be atomic at the
//! storage layer.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::billing::UsageRange;
use crate::domain::events::{ProviderCallEvent, UsageEvent};
use crate::domain::idempotency::{IdempotencyRecord, Reservation, ReservationLease};
use crate::domain::session::{Message, Session, SessionId};
use crate::domain::tenant::{Tenant, TenantId};
use crate::domain::turn::SendMessageResponse;

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn save(&self, tenant: &Tenant) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Save agent (create or update)
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError>;

    async fn find_for_tenant(&self, tenant_id: TenantId, id: AgentId) -> Result<Option<Agent>, RepositoryError>;

    /// Agents of a tenant, newest first
    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Agent>, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn save(&self, session: &Session) -> Result<(), RepositoryError>;

    async fn find_for_tenant(&self, tenant_id: TenantId, id: SessionId) -> Result<Option<Session>, RepositoryError>;
}

/// Append-only transcript storage
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(&self, message: &Message) -> Result<(), RepositoryError>;

    /// Messages of a session ordered ascending by `created_at`, ties broken by insertion order
    async fn list_for_session(&self, tenant_id: TenantId, session_id: SessionId) -> Result<Vec<Message>, RepositoryError>;
}

#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// Completed record for `(tenant_id, key)`; in-flight reservations are not returned
    async fn find(&self, tenant_id: TenantId, key: &str) -> Result<Option<IdempotencyRecord>, RepositoryError>;

    /// Atomic insert-if-absent of an in-flight reservation.
    ///
    /// An in-flight reservation whose lease has expired counts as absent and
    /// is taken over by the caller.
    async fn reserve(
        &self,
        tenant_id: TenantId,
        key: &str,
        request_hash: &str,
        lease: &ReservationLease,
    ) -> Result<Reservation, RepositoryError>;

    /// Persist the completed response for `(tenant_id, key)`.
    ///
    /// Replaces the caller's own in-flight reservation (or inserts when none
    /// exists). Fails with `RepositoryError::DuplicateKey` when the key is
    /// already completed or reserved for a different request hash.
    async fn create(
        &self,
        tenant_id: TenantId,
        key: &str,
        request_hash: &str,
        response: &SendMessageResponse,
    ) -> Result<IdempotencyRecord, RepositoryError>;

    /// Drop the in-flight reservation held under `token`.
    ///
    /// Completed records and reservations taken over by another holder are
    /// never removed.
    async fn release(&self, tenant_id: TenantId, key: &str, token: Uuid) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProviderCallRepository: Send + Sync {
    async fn save(&self, event: &ProviderCallEvent) -> Result<(), RepositoryError>;

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<ProviderCallEvent>, RepositoryError>;
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn save(&self, event: &UsageEvent) -> Result<(), RepositoryError>;

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<UsageEvent>, RepositoryError>;

    /// Usage events whose `created_at` falls inside `range`
    async fn list_in_range(&self, tenant_id: TenantId, range: &UsageRange) -> Result<Vec<UsageEvent>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::DuplicateKey(db.message().to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
