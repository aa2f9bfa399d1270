// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::agent::AgentId;
use crate::domain::billing::UsageRange;
use crate::domain::events::{EventId, UsageEvent};
use crate::domain::repository::{RepositoryError, UsageRepository};
use crate::domain::session::SessionId;
use crate::domain::tenant::TenantId;

pub struct PostgresUsageRepository {
    pool: PgPool,
}

impl PostgresUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn token_count(row: &PgRow, column: &str) -> Result<u32, RepositoryError> {
    stored_tokens(column, row.get(column))
}

/// Stored BIGINT back to the domain's u32; anything outside the range is corrupt data
fn stored_tokens(column: &str, stored: i64) -> Result<u32, RepositoryError> {
    u32::try_from(stored)
        .map_err(|_| RepositoryError::Serialization(format!("{} out of range: {}", column, stored)))
}

fn usage_from_row(row: PgRow) -> Result<UsageEvent, RepositoryError> {
    let tokens_in = token_count(&row, "tokens_in")?;
    let tokens_out = token_count(&row, "tokens_out")?;
    Ok(UsageEvent {
        id: EventId(row.get("id")),
        tenant_id: TenantId(row.get("tenant_id")),
        session_id: SessionId(row.get("session_id")),
        agent_id: AgentId(row.get("agent_id")),
        provider: row.get("provider"),
        tokens_in,
        tokens_out,
        cost_usd: row.get("cost_usd"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl UsageRepository for PostgresUsageRepository {
    async fn save(&self, event: &UsageEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO usage_events (
                id, tenant_id, session_id, agent_id, provider,
                tokens_in, tokens_out, cost_usd, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.id.0)
        .bind(event.tenant_id.0)
        .bind(event.session_id.0)
        .bind(event.agent_id.0)
        .bind(&event.provider)
        .bind(i64::from(event.tokens_in))
        .bind(i64::from(event.tokens_out))
        .bind(event.cost_usd)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save usage event: {}", e)))?;

        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<UsageEvent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, session_id, agent_id, provider,
                   tokens_in, tokens_out, cost_usd, created_at
            FROM usage_events
            WHERE tenant_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(usage_from_row).collect()
    }

    async fn list_in_range(&self, tenant_id: TenantId, range: &UsageRange) -> Result<Vec<UsageEvent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, session_id, agent_id, provider,
                   tokens_in, tokens_out, cost_usd, created_at
            FROM usage_events
            WHERE tenant_id = $1 AND created_at >= $2 AND created_at <= $3
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id.0)
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(usage_from_row).collect()
    }
}
