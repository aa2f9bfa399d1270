// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Agent Service - agent provisioning and configuration changes

use std::sync::Arc;
use tracing::info;

use crate::domain::agent::{Agent, AgentId, AgentPatch};
use crate::domain::errors::GatewayError;
use crate::domain::repository::{AgentRepository, TenantRepository};
use crate::domain::tenant::TenantId;

/// Fields of a new agent
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub name: String,
    pub primary_provider: String,
    pub fallback_provider: Option<String>,
    pub system_prompt: String,
    pub enabled_tools: Vec<String>,
}

pub struct AgentService {
    tenants: Arc<dyn TenantRepository>,
    agents: Arc<dyn AgentRepository>,
}

impl AgentService {
    pub fn new(tenants: Arc<dyn TenantRepository>, agents: Arc<dyn AgentRepository>) -> Self {
        Self { tenants, agents }
    }

    /// Create an agent under an existing tenant
    pub async fn create_agent(&self, tenant_id: TenantId, new_agent: NewAgent) -> Result<Agent, GatewayError> {
        self.tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(GatewayError::tenant_not_found)?;

        let agent = Agent::new(
            tenant_id,
            new_agent.name,
            new_agent.primary_provider,
            new_agent.fallback_provider,
            new_agent.system_prompt,
            new_agent.enabled_tools,
        )?;
        self.agents.save(&agent).await?;
        info!(tenant_id = %tenant_id, agent_id = %agent.id, "Agent created");
        Ok(agent)
    }

    /// Apply a partial update. Later turns route with the new configuration;
    /// stored idempotent responses are not affected.
    pub async fn update_agent(
        &self,
        tenant_id: TenantId,
        agent_id: AgentId,
        patch: AgentPatch,
    ) -> Result<Agent, GatewayError> {
        let mut agent = self
            .agents
            .find_for_tenant(tenant_id, agent_id)
            .await?
            .ok_or_else(GatewayError::agent_not_found)?;

        agent.update(patch)?;
        self.agents.save(&agent).await?;
        info!(tenant_id = %tenant_id, agent_id = %agent_id, "Agent updated");
        Ok(agent)
    }
}
