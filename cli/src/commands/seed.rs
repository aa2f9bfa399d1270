// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `mgw seed`: provision a tenant, an agent and one session

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use gateway_core::application::agent_service::NewAgent;
use gateway_core::domain::agent::AgentId;
use gateway_core::domain::session::SessionId;
use gateway_core::domain::tenant::{Tenant, TenantId};

use crate::runtime::GatewayRuntime;

#[derive(Args)]
pub struct SeedCommand {
    /// Tenant display name
    #[arg(long, default_value = "Acme")]
    tenant_name: String,

    /// Agent display name
    #[arg(long, default_value = "Support")]
    agent_name: String,

    /// Primary provider identifier
    #[arg(long, default_value = "vendorA")]
    primary: String,

    /// Fallback provider identifier
    #[arg(long, default_value = "vendorB")]
    fallback: String,

    /// Create the agent without a fallback provider
    #[arg(long)]
    no_fallback: bool,

    /// Agent system prompt
    #[arg(long, default_value = "You are a helpful support agent.")]
    system_prompt: String,

    /// Customer identifier for the session
    #[arg(long, default_value = "customer-1")]
    customer: String,
}

/// Identifiers of the provisioned entities
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedOutput {
    pub tenant_id: TenantId,
    pub agent_id: AgentId,
    pub session_id: SessionId,
}

impl SeedCommand {
    pub fn new(primary: impl Into<String>, fallback: Option<String>) -> Self {
        Self {
            tenant_name: "Acme".to_string(),
            agent_name: "Support".to_string(),
            primary: primary.into(),
            fallback: fallback.clone().unwrap_or_default(),
            no_fallback: fallback.is_none(),
            system_prompt: "You are a helpful support agent.".to_string(),
            customer: "customer-1".to_string(),
        }
    }
}

pub async fn execute(command: SeedCommand, config_path: Option<PathBuf>) -> Result<()> {
    let runtime = GatewayRuntime::connect(config_path).await?;
    let output = seed(&runtime, &command).await?;

    eprintln!("{}", "✓ Seeded tenant, agent and session".green());
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Create the tenant, agent and session described by `command`
pub async fn seed(runtime: &GatewayRuntime, command: &SeedCommand) -> Result<SeedOutput> {
    let fallback = (!command.no_fallback).then(|| command.fallback.clone());
    for provider in std::iter::once(&command.primary).chain(fallback.iter()) {
        if !runtime.registry.contains(provider) {
            warn!(provider = %provider, "Agent references a provider that is not registered");
        }
    }

    let tenant = Tenant::new(command.tenant_name.clone());
    runtime.repositories.tenants.save(&tenant).await?;

    let agent = runtime
        .agents
        .create_agent(
            tenant.id,
            NewAgent {
                name: command.agent_name.clone(),
                primary_provider: command.primary.clone(),
                fallback_provider: fallback,
                system_prompt: command.system_prompt.clone(),
                enabled_tools: Vec::new(),
            },
        )
        .await?;

    let session = runtime
        .sessions
        .create_session(
            tenant.id,
            agent.id,
            &command.customer,
            serde_json::json!({ "source": "mgw seed" }),
        )
        .await?;

    Ok(SeedOutput {
        tenant_id: tenant.id,
        agent_id: agent.id,
        session_id: session.id,
    })
}
