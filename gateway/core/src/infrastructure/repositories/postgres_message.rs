// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::repository::{MessageRepository, RepositoryError};
use crate::domain::session::{Message, MessageId, Role, SessionId};
use crate::domain::tenant::TenantId;

pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn append(&self, message: &Message) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, tenant_id, session_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id.0)
        .bind(message.tenant_id.0)
        .bind(message.session_id.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to append message: {}", e)))?;

        Ok(())
    }

    async fn list_for_session(&self, tenant_id: TenantId, session_id: SessionId) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, session_id, role, content, created_at
            FROM messages
            WHERE tenant_id = $1 AND session_id = $2
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(tenant_id.0)
        .bind(session_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let role: String = row.get("role");
                Ok(Message {
                    id: MessageId(row.get("id")),
                    tenant_id: TenantId(row.get("tenant_id")),
                    session_id: SessionId(row.get("session_id")),
                    role: role.parse::<Role>().map_err(RepositoryError::Serialization)?,
                    content: row.get("content"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}
