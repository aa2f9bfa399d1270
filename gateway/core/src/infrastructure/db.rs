// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that can be
//! injected into all PostgreSQL repository implementations, and owns the
//! embedded schema migrations under `gateway/core/migrations/`.

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::domain::repository::PostgresConfig;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(connection_string: &str) -> Result<Self> {
        Self::connect(connection_string, 5).await
    }

    pub async fn from_config(config: &PostgresConfig) -> Result<Self> {
        Self::connect(&config.connection_string, config.max_connections).await
    }

    async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Apply pending migrations; returns how many were pending
    pub async fn migrate(&self) -> Result<usize> {
        let applied = sqlx::query("SELECT version FROM _sqlx_migrations")
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.len())
            .unwrap_or(0);
        let pending = MIGRATOR.iter().count().saturating_sub(applied);

        MIGRATOR
            .run(&self.pool)
            .await
            .context("Failed to apply migrations")?;
        info!(pending, "Database migrations applied");
        Ok(pending)
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}
