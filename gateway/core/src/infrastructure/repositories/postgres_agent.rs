// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Agent Repository
//!
//! `AgentRepository` backed by the `agents` table. Enabled tools are stored
//! as a JSONB array; every lookup is filtered by `tenant_id`.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::repository::{AgentRepository, RepositoryError};
use crate::domain::tenant::TenantId;

pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn agent_from_row(row: &PgRow) -> Result<Agent, RepositoryError> {
    let tools: serde_json::Value = row.get("enabled_tools");
    let enabled_tools: Vec<String> = serde_json::from_value(tools)
        .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize enabled_tools: {}", e)))?;

    Ok(Agent {
        id: AgentId(row.get("id")),
        tenant_id: TenantId(row.get("tenant_id")),
        name: row.get("name"),
        primary_provider: row.get("primary_provider"),
        fallback_provider: row.get("fallback_provider"),
        system_prompt: row.get("system_prompt"),
        enabled_tools,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        let enabled_tools = serde_json::to_value(&agent.enabled_tools)?;

        sqlx::query(
            r#"
            INSERT INTO agents (
                id, tenant_id, name, primary_provider, fallback_provider,
                system_prompt, enabled_tools, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                primary_provider = EXCLUDED.primary_provider,
                fallback_provider = EXCLUDED.fallback_provider,
                system_prompt = EXCLUDED.system_prompt,
                enabled_tools = EXCLUDED.enabled_tools,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(agent.id.0)
        .bind(agent.tenant_id.0)
        .bind(&agent.name)
        .bind(&agent.primary_provider)
        .bind(agent.fallback_provider.as_deref())
        .bind(&agent.system_prompt)
        .bind(enabled_tools)
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save agent: {}", e)))?;

        Ok(())
    }

    async fn find_for_tenant(&self, tenant_id: TenantId, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, primary_provider, fallback_provider,
                   system_prompt, enabled_tools, created_at, updated_at
            FROM agents
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id.0)
        .bind(tenant_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(agent_from_row).transpose()
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, name, primary_provider, fallback_provider,
                   system_prompt, enabled_tools, created_at, updated_at
            FROM agents
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(agent_from_row).collect()
    }
}
