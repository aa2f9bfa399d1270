// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Idempotency Repository
//!
//! Keys live in `idempotency_keys` with primary key `(tenant_id, key)`.
//! A row whose `response_json` is NULL is an in-flight reservation; a row
//! with a response is a completed, immutable record.
//!
//! - `reserve` is an insert that only overwrites an in-flight row whose lease
//!   (`expires_at`) has passed; a legacy row without a lease counts as expired
//! - `create` is a conditional upsert that only overwrites the caller's own reservation
//! - `release` deletes the in-flight row carrying the caller's `reservation_token`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::idempotency::{IdempotencyRecord, Reservation, ReservationLease};
use crate::domain::repository::{IdempotencyRepository, RepositoryError};
use crate::domain::tenant::TenantId;
use crate::domain::turn::SendMessageResponse;

/// A reservation released between our insert and our read forces another round
const MAX_RESERVE_ROUNDS: usize = 3;

pub struct PostgresIdempotencyRepository {
    pool: PgPool,
}

impl PostgresIdempotencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, tenant_id: TenantId, key: &str) -> Result<Option<PgRow>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT request_hash, response_json, created_at
            FROM idempotency_keys
            WHERE tenant_id = $1 AND key = $2
            "#,
        )
        .bind(tenant_id.0)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

fn completed_record(tenant_id: TenantId, key: &str, row: &PgRow) -> Result<Option<IdempotencyRecord>, RepositoryError> {
    let response_json: Option<serde_json::Value> = row.get("response_json");
    let Some(response_json) = response_json else {
        return Ok(None);
    };

    let response: SendMessageResponse = serde_json::from_value(response_json)?;
    Ok(Some(IdempotencyRecord {
        tenant_id,
        key: key.to_string(),
        request_hash: row.get("request_hash"),
        response,
        created_at: row.get("created_at"),
    }))
}

#[async_trait]
impl IdempotencyRepository for PostgresIdempotencyRepository {
    async fn find(&self, tenant_id: TenantId, key: &str) -> Result<Option<IdempotencyRecord>, RepositoryError> {
        match self.load(tenant_id, key).await? {
            Some(row) => completed_record(tenant_id, key, &row),
            None => Ok(None),
        }
    }

    async fn reserve(
        &self,
        tenant_id: TenantId,
        key: &str,
        request_hash: &str,
        lease: &ReservationLease,
    ) -> Result<Reservation, RepositoryError> {
        let ttl_ms = i64::try_from(lease.ttl.as_millis()).unwrap_or(i64::MAX);

        for _ in 0..MAX_RESERVE_ROUNDS {
            let inserted = sqlx::query(
                r#"
                INSERT INTO idempotency_keys (
                    tenant_id, key, request_hash, response_json, reservation_token, expires_at, created_at
                )
                VALUES ($1, $2, $3, NULL, $4, NOW() + ($5::float8 * INTERVAL '1 millisecond'), NOW())
                ON CONFLICT (tenant_id, key) DO UPDATE SET
                    request_hash = EXCLUDED.request_hash,
                    reservation_token = EXCLUDED.reservation_token,
                    expires_at = EXCLUDED.expires_at,
                    created_at = EXCLUDED.created_at
                WHERE idempotency_keys.response_json IS NULL
                  AND (idempotency_keys.expires_at IS NULL OR idempotency_keys.expires_at <= NOW())
                RETURNING key
                "#,
            )
            .bind(tenant_id.0)
            .bind(key)
            .bind(request_hash)
            .bind(lease.token)
            .bind(ttl_ms)
            .fetch_optional(&self.pool)
            .await?;

            if inserted.is_some() {
                return Ok(Reservation::Acquired);
            }

            if let Some(row) = self.load(tenant_id, key).await? {
                return Ok(match completed_record(tenant_id, key, &row)? {
                    Some(record) => Reservation::Completed(record),
                    None => Reservation::InFlight {
                        request_hash: row.get("request_hash"),
                    },
                });
            }
        }

        Err(RepositoryError::Database(format!(
            "Could not reserve idempotency key '{}' under contention",
            key
        )))
    }

    async fn create(
        &self,
        tenant_id: TenantId,
        key: &str,
        request_hash: &str,
        response: &SendMessageResponse,
    ) -> Result<IdempotencyRecord, RepositoryError> {
        let response_json = serde_json::to_value(response)?;

        let row = sqlx::query(
            r#"
            INSERT INTO idempotency_keys (tenant_id, key, request_hash, response_json, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (tenant_id, key) DO UPDATE SET
                response_json = EXCLUDED.response_json,
                created_at = EXCLUDED.created_at
            WHERE idempotency_keys.response_json IS NULL
              AND idempotency_keys.request_hash = EXCLUDED.request_hash
            RETURNING created_at
            "#,
        )
        .bind(tenant_id.0)
        .bind(key)
        .bind(request_hash)
        .bind(response_json)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(RepositoryError::DuplicateKey(format!(
                "idempotency key '{}' already completed or held by another request",
                key
            )));
        };

        let created_at: DateTime<Utc> = row.get("created_at");
        Ok(IdempotencyRecord {
            tenant_id,
            key: key.to_string(),
            request_hash: request_hash.to_string(),
            response: response.clone(),
            created_at,
        })
    }

    async fn release(&self, tenant_id: TenantId, key: &str, token: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            DELETE FROM idempotency_keys
            WHERE tenant_id = $1 AND key = $2 AND response_json IS NULL AND reservation_token = $3
            "#,
        )
        .bind(tenant_id.0)
        .bind(key)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
