// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::agent::AgentId;
use crate::domain::events::{CallStatus, EventId, ProviderCallEvent};
use crate::domain::repository::{ProviderCallRepository, RepositoryError};
use crate::domain::session::SessionId;
use crate::domain::tenant::TenantId;

pub struct PostgresProviderCallRepository {
    pool: PgPool,
}

impl PostgresProviderCallRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderCallRepository for PostgresProviderCallRepository {
    async fn save(&self, event: &ProviderCallEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO provider_call_events (
                id, tenant_id, session_id, agent_id, provider,
                status, latency_ms, error_code, request_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(event.id.0)
        .bind(event.tenant_id.0)
        .bind(event.session_id.0)
        .bind(event.agent_id.0)
        .bind(&event.provider)
        .bind(event.status.as_str())
        .bind(i64::try_from(event.latency_ms).unwrap_or(i64::MAX))
        .bind(event.error_code.as_deref())
        .bind(&event.request_id)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save provider call event: {}", e)))?;

        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<ProviderCallEvent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, session_id, agent_id, provider,
                   status, latency_ms, error_code, request_id, created_at
            FROM provider_call_events
            WHERE tenant_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let status: String = row.get("status");
                let latency_ms: i64 = row.get("latency_ms");
                ProviderCallEvent {
                    id: EventId(row.get("id")),
                    tenant_id: TenantId(row.get("tenant_id")),
                    session_id: SessionId(row.get("session_id")),
                    agent_id: AgentId(row.get("agent_id")),
                    provider: row.get("provider"),
                    status: if status == "ok" { CallStatus::Ok } else { CallStatus::Error },
                    latency_ms: u64::try_from(latency_ms).unwrap_or(0),
                    error_code: row.get("error_code"),
                    request_id: row.get("request_id"),
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }
}
