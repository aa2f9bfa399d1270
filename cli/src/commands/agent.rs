// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `mgw agent update`: change an agent's configuration
//!
//! Only the flags given are changed. `--fallback ""` removes the fallback
//! provider.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::warn;

use gateway_core::domain::agent::{Agent, AgentId, AgentPatch};
use gateway_core::domain::tenant::TenantId;

use crate::runtime::GatewayRuntime;

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Update name, providers, system prompt or tools of an agent
    Update(UpdateAgentArgs),
}

#[derive(Args)]
pub struct UpdateAgentArgs {
    /// Tenant ID
    #[arg(long)]
    tenant: String,

    /// Agent ID
    #[arg(long)]
    agent: String,

    /// New display name
    #[arg(long)]
    name: Option<String>,

    /// New primary provider identifier
    #[arg(long)]
    primary: Option<String>,

    /// New fallback provider identifier (empty to remove)
    #[arg(long)]
    fallback: Option<String>,

    /// New system prompt
    #[arg(long)]
    system_prompt: Option<String>,

    /// Replace the enabled tools (comma separated)
    #[arg(long, value_delimiter = ',')]
    tools: Option<Vec<String>>,
}

impl UpdateAgentArgs {
    fn patch(&self) -> AgentPatch {
        AgentPatch {
            name: self.name.clone(),
            primary_provider: self.primary.clone(),
            fallback_provider: self.fallback.clone(),
            system_prompt: self.system_prompt.clone(),
            enabled_tools: self.tools.clone(),
        }
    }
}

pub async fn handle_command(command: AgentCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        AgentCommand::Update(args) => {
            let tenant_id = TenantId::from_string(&args.tenant).context("Invalid tenant id")?;
            let agent_id = AgentId::from_string(&args.agent).context("Invalid agent id")?;

            let runtime = GatewayRuntime::connect(config_path).await?;
            let agent = update(&runtime, tenant_id, agent_id, args.patch()).await?;

            eprintln!("{}", "✓ Agent updated".green());
            println!("{}", serde_json::to_string_pretty(&agent)?);
            Ok(())
        }
    }
}

/// Apply `patch`, warning about providers the runtime cannot route to
pub async fn update(
    runtime: &GatewayRuntime,
    tenant_id: TenantId,
    agent_id: AgentId,
    patch: AgentPatch,
) -> Result<Agent> {
    let agent = runtime.agents.update_agent(tenant_id, agent_id, patch).await?;
    for provider in agent.provider_chain() {
        if !runtime.registry.contains(provider) {
            warn!(provider = %provider, "Agent references a provider that is not registered");
        }
    }
    Ok(agent)
}
