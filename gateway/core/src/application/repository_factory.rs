// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on storage backend configuration,
//! keeping the Domain Layer free of infrastructure dependencies.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Build the repository set the gateway and its services share

use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::repository::{
    AgentRepository, IdempotencyRepository, MessageRepository, ProviderCallRepository,
    SessionRepository, StorageBackend, TenantRepository, UsageRepository,
};
use crate::infrastructure::repositories::postgres_agent::PostgresAgentRepository;
use crate::infrastructure::repositories::postgres_idempotency::PostgresIdempotencyRepository;
use crate::infrastructure::repositories::postgres_message::PostgresMessageRepository;
use crate::infrastructure::repositories::postgres_provider_call::PostgresProviderCallRepository;
use crate::infrastructure::repositories::postgres_session::PostgresSessionRepository;
use crate::infrastructure::repositories::postgres_tenant::PostgresTenantRepository;
use crate::infrastructure::repositories::postgres_usage::PostgresUsageRepository;
use crate::infrastructure::repositories::{
    InMemoryAgentRepository, InMemoryIdempotencyRepository, InMemoryMessageRepository,
    InMemoryProviderCallRepository, InMemorySessionRepository, InMemoryTenantRepository,
    InMemoryUsageRepository,
};

/// One handle per aggregate store, shared by every service of a process
#[derive(Clone)]
pub struct GatewayRepositories {
    pub tenants: Arc<dyn TenantRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub idempotency: Arc<dyn IdempotencyRepository>,
    pub provider_calls: Arc<dyn ProviderCallRepository>,
    pub usage: Arc<dyn UsageRepository>,
}

impl GatewayRepositories {
    pub fn in_memory() -> Self {
        Self {
            tenants: Arc::new(InMemoryTenantRepository::new()),
            agents: Arc::new(InMemoryAgentRepository::new()),
            sessions: Arc::new(InMemorySessionRepository::new()),
            messages: Arc::new(InMemoryMessageRepository::new()),
            idempotency: Arc::new(InMemoryIdempotencyRepository::new()),
            provider_calls: Arc::new(InMemoryProviderCallRepository::new()),
            usage: Arc::new(InMemoryUsageRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            tenants: Arc::new(PostgresTenantRepository::new(pool.clone())),
            agents: Arc::new(PostgresAgentRepository::new(pool.clone())),
            sessions: Arc::new(PostgresSessionRepository::new(pool.clone())),
            messages: Arc::new(PostgresMessageRepository::new(pool.clone())),
            idempotency: Arc::new(PostgresIdempotencyRepository::new(pool.clone())),
            provider_calls: Arc::new(PostgresProviderCallRepository::new(pool.clone())),
            usage: Arc::new(PostgresUsageRepository::new(pool)),
        }
    }
}

/// Creates the repository set for the configured backend
pub fn create_repositories(backend: &StorageBackend, pool: Option<PgPool>) -> anyhow::Result<GatewayRepositories> {
    match (backend, pool) {
        (StorageBackend::InMemory, _) => Ok(GatewayRepositories::in_memory()),
        (StorageBackend::PostgreSQL(_), Some(pool)) => Ok(GatewayRepositories::postgres(pool)),
        (StorageBackend::PostgreSQL(_), None) => {
            anyhow::bail!("PostgreSQL backend selected but no connection pool was provided")
        }
    }
}
