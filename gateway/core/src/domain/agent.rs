// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::GatewayError;
use crate::domain::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration used to answer the turns of a session.
///
/// Invariant: `fallback_provider`, when set, differs from `primary_provider`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub tenant_id: TenantId,
    pub name: String,
    pub primary_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,
    pub system_prompt: String,
    #[serde(default)]
    pub enabled_tools: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied by [`Agent::update`]. `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPatch {
    pub name: Option<String>,
    pub primary_provider: Option<String>,
    pub fallback_provider: Option<String>,
    pub system_prompt: Option<String>,
    pub enabled_tools: Option<Vec<String>>,
}

impl Agent {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        primary_provider: impl Into<String>,
        fallback_provider: Option<String>,
        system_prompt: impl Into<String>,
        enabled_tools: Vec<String>,
    ) -> Result<Self, GatewayError> {
        let now = Utc::now();
        let agent = Self {
            id: AgentId::new(),
            tenant_id,
            name: name.into(),
            primary_provider: primary_provider.into(),
            fallback_provider: fallback_provider.filter(|f| !f.is_empty()),
            system_prompt: system_prompt.into(),
            enabled_tools,
            created_at: now,
            updated_at: now,
        };
        agent.validate()?;
        Ok(agent)
    }

    pub fn update(&mut self, patch: AgentPatch) -> Result<(), GatewayError> {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(primary) = patch.primary_provider {
            next.primary_provider = primary;
        }
        if let Some(fallback) = patch.fallback_provider {
            next.fallback_provider = Some(fallback).filter(|f| !f.is_empty());
        }
        if let Some(prompt) = patch.system_prompt {
            next.system_prompt = prompt;
        }
        if let Some(tools) = patch.enabled_tools {
            next.enabled_tools = tools;
        }
        next.validate()?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    /// Providers in the order they are tried: primary, then the optional fallback
    pub fn provider_chain(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_provider.as_str()).chain(self.fallback_provider.as_deref())
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.name.trim().is_empty()
            || self.primary_provider.trim().is_empty()
            || self.system_prompt.trim().is_empty()
        {
            return Err(GatewayError::bad_request(
                "name, primaryProvider, systemPrompt required",
            ));
        }
        if self.fallback_provider.as_deref() == Some(self.primary_provider.as_str()) {
            return Err(GatewayError::bad_request(
                "Fallback provider must differ from primary provider",
            ));
        }
        Ok(())
    }
}
