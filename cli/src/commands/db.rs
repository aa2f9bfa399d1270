// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database commands
//!
//! `mgw db migrate` applies the embedded schema migrations to the PostgreSQL
//! database named by `spec.database.url` (or `MGW_DATABASE_URL`).

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use gateway_core::domain::repository::StorageBackend;
use gateway_core::infrastructure::db::Database;

use crate::runtime::load_config;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Apply pending schema migrations
    Migrate,
}

pub async fn handle_command(command: DbCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        DbCommand::Migrate => migrate(config_path).await,
    }
}

async fn migrate(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    let StorageBackend::PostgreSQL(pg) = config.storage_backend() else {
        anyhow::bail!("No database configured. Set spec.database.url or MGW_DATABASE_URL.");
    };

    println!("Connecting to database...");
    let database = Database::from_config(&pg).await?;

    let pending = database
        .migrate()
        .await
        .context("Migration failed")?;

    if pending == 0 {
        println!("{}", "✓ Database schema is up to date".green());
    } else {
        println!(
            "{}",
            format!("✓ Applied {} migration(s)", pending).green()
        );
    }

    Ok(())
}
