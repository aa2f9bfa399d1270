// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Session Service - session provisioning and transcript reads

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::domain::agent::AgentId;
use crate::domain::errors::GatewayError;
use crate::domain::repository::{AgentRepository, MessageRepository, SessionRepository};
use crate::domain::session::{Message, Session, SessionId};
use crate::domain::tenant::TenantId;

/// A session and its ordered messages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub session: Session,
    pub messages: Vec<Message>,
}

pub struct SessionService {
    agents: Arc<dyn AgentRepository>,
    sessions: Arc<dyn SessionRepository>,
    messages: Arc<dyn MessageRepository>,
}

impl SessionService {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        sessions: Arc<dyn SessionRepository>,
        messages: Arc<dyn MessageRepository>,
    ) -> Self {
        Self {
            agents,
            sessions,
            messages,
        }
    }

    pub async fn create_session(
        &self,
        tenant_id: TenantId,
        agent_id: AgentId,
        customer_id: &str,
        metadata: serde_json::Value,
    ) -> Result<Session, GatewayError> {
        if customer_id.trim().is_empty() {
            return Err(GatewayError::bad_request("agentId, customerId required"));
        }

        self.agents
            .find_for_tenant(tenant_id, agent_id)
            .await?
            .ok_or_else(GatewayError::agent_not_found)?;

        let session = Session::new(tenant_id, agent_id, customer_id, metadata);
        self.sessions.save(&session).await?;
        info!(tenant_id = %tenant_id, session_id = %session.id, agent_id = %agent_id, "Session created");
        Ok(session)
    }

    pub async fn transcript(&self, tenant_id: TenantId, session_id: SessionId) -> Result<Transcript, GatewayError> {
        let session = self
            .sessions
            .find_for_tenant(tenant_id, session_id)
            .await?
            .ok_or_else(GatewayError::session_not_found)?;
        let messages = self.messages.list_for_session(tenant_id, session_id).await?;
        Ok(Transcript { session, messages })
    }
}
