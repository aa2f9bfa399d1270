// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `mgw send`: run one conversational turn
//!
//! Prints the JSON response on success, or the JSON error body together with
//! its HTTP-equivalent status on failure.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use uuid::Uuid;

use gateway_core::application::MessageGateway;
use gateway_core::domain::errors::GatewayError;
use gateway_core::domain::session::SessionId;
use gateway_core::domain::tenant::TenantId;
use gateway_core::domain::turn::{SendMessageRequest, SendMessageResponse};

use crate::runtime::GatewayRuntime;

#[derive(Args)]
pub struct SendCommand {
    /// Tenant ID
    #[arg(long)]
    tenant: String,

    /// Session ID
    #[arg(long)]
    session: String,

    /// Customer message text
    #[arg(long)]
    content: String,

    /// Idempotency key
    #[arg(long)]
    key: Option<String>,

    /// Correlation id (generated when omitted)
    #[arg(long)]
    request_id: Option<String>,
}

pub async fn execute(command: SendCommand, config_path: Option<PathBuf>) -> Result<()> {
    let tenant_id = TenantId::from_string(&command.tenant).context("Invalid tenant id")?;
    let session_id = SessionId::from_string(&command.session).context("Invalid session id")?;
    let request_id = command
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let runtime = GatewayRuntime::connect(config_path).await?;
    let request = SendMessageRequest {
        tenant_id,
        session_id,
        content: command.content,
        idempotency_key: command.key,
        request_id: request_id.clone(),
    };

    match runtime.gateway.send_message(request).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", render_error(&err, &request_id)?);
            anyhow::bail!("Request failed with status {} ({})", err.status(), err.code())
        }
    }
}

/// Pretty JSON of the boundary error body
pub fn render_error(err: &GatewayError, request_id: &str) -> Result<String> {
    Ok(serde_json::to_string_pretty(&err.to_body(Some(request_id)))?)
}

/// One-line human summary of a completed turn
pub fn summarize(response: &SendMessageResponse) -> String {
    format!(
        "{} via {}{} | {} in / {} out | ${:.6} | {} ms",
        response.reply,
        response.provider,
        if response.fallback_used { " (fallback)" } else { "" },
        response.tokens_in,
        response.tokens_out,
        response.cost_usd,
        response.latency_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_hides_internal_details() {
        let err = GatewayError::Repository(
            gateway_core::domain::repository::RepositoryError::Database("connection refused".into()),
        );
        let body = render_error(&err, "req-9").unwrap();

        assert!(body.contains("\"code\": \"INTERNAL_ERROR\""));
        assert!(body.contains("\"requestId\": \"req-9\""));
        assert!(!body.contains("connection refused"));
    }

    #[test]
    fn test_render_error_keeps_client_messages() {
        let body = render_error(&GatewayError::missing_idempotency_key(), "req-1").unwrap();
        assert!(body.contains("MISSING_IDEMPOTENCY_KEY"));
    }
}
