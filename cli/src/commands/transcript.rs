// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `mgw transcript`: print a session and its ordered messages

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use gateway_core::domain::session::SessionId;
use gateway_core::domain::tenant::TenantId;

use crate::runtime::GatewayRuntime;

#[derive(Args)]
pub struct TranscriptCommand {
    /// Tenant ID
    #[arg(long)]
    tenant: String,

    /// Session ID
    #[arg(long)]
    session: String,
}

pub async fn execute(command: TranscriptCommand, config_path: Option<PathBuf>) -> Result<()> {
    let tenant_id = TenantId::from_string(&command.tenant).context("Invalid tenant id")?;
    let session_id = SessionId::from_string(&command.session).context("Invalid session id")?;

    let runtime = GatewayRuntime::connect(config_path).await?;
    let transcript = runtime.sessions.transcript(tenant_id, session_id).await?;

    println!("{}", serde_json::to_string_pretty(&transcript)?);
    Ok(())
}
