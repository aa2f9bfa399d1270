// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::agent::AgentId;
use crate::domain::repository::{RepositoryError, SessionRepository};
use crate::domain::session::{Session, SessionId};
use crate::domain::tenant::TenantId;

pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, tenant_id, agent_id, customer_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET metadata = EXCLUDED.metadata
            "#,
        )
        .bind(session.id.0)
        .bind(session.tenant_id.0)
        .bind(session.agent_id.0)
        .bind(&session.customer_id)
        .bind(&session.metadata)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save session: {}", e)))?;

        Ok(())
    }

    async fn find_for_tenant(&self, tenant_id: TenantId, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, agent_id, customer_id, metadata, created_at
            FROM sessions
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id.0)
        .bind(tenant_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Session {
            id: SessionId(row.get("id")),
            tenant_id: TenantId(row.get("tenant_id")),
            agent_id: AgentId(row.get("agent_id")),
            customer_id: row.get("customer_id"),
            metadata: row.get("metadata"),
            created_at: row.get("created_at"),
        }))
    }
}
