// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `mgw demo`: seed and exercise an in-memory gateway
//!
//! Walks through a first turn, an idempotent replay, a conflicting key reuse,
//! a missing key and a primary-provider outage answered by the fallback, then
//! prints the provider call log and the usage rollup. No database is needed.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use uuid::Uuid;

use gateway_core::application::MessageGateway;
use gateway_core::domain::billing::UsageRange;
use gateway_core::domain::errors::GatewayError;
use gateway_core::domain::events::{CallStatus, GatewayEvent};
use gateway_core::domain::gateway_config::{
    FaultConfig, GatewayConfigManifest, ProviderConfig, ProviderType,
};
use gateway_core::domain::session::SessionId;
use gateway_core::domain::tenant::TenantId;
use gateway_core::domain::turn::{SendMessageRequest, SendMessageResponse};
use gateway_core::infrastructure::EventBusError;

use super::seed::{seed, SeedCommand};
use super::send::{render_error, summarize};
use super::usage::print_summary;
use crate::runtime::GatewayRuntime;

/// Provider registered by the demo whose upstream always fails
pub const OUTAGE_PROVIDER: &str = "vendorA-outage";

#[derive(Args)]
pub struct DemoCommand {
    /// Keep the configured fault profiles instead of disabling injected failures
    #[arg(long)]
    faults: bool,
}

pub async fn execute(command: DemoCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = demo_config(GatewayConfigManifest::load_or_default(config_path)?, command.faults);
    let runtime = GatewayRuntime::in_memory(config)?;
    let mut events = runtime.event_bus.subscribe();

    println!("{}", "Seeding tenant, agent (vendorA -> vendorB) and session".bold());
    let primary = seed(&runtime, &SeedCommand::new("vendorA", Some("vendorB".to_string()))).await?;
    println!("  tenant {}  session {}", primary.tenant_id, primary.session_id);
    println!();

    let content = "Hello, I need help with my order";

    println!("{}", "1. First turn (key demo-1)".bold());
    let first = turn(&runtime, primary.tenant_id, primary.session_id, content, Some("demo-1")).await;
    println!();

    println!("{}", "2. Retry with the same key and payload".bold());
    let replay = turn(&runtime, primary.tenant_id, primary.session_id, content, Some("demo-1")).await;
    if let (Some(first), Some(replay)) = (&first, &replay) {
        if first == replay {
            println!("  {}", "✓ Replayed stored response; provider not called again".green());
        }
    }
    println!();

    println!("{}", "3. Same key, different payload".bold());
    turn(&runtime, primary.tenant_id, primary.session_id, "Something else", Some("demo-1")).await;
    println!();

    println!("{}", "4. No idempotency key".bold());
    turn(&runtime, primary.tenant_id, primary.session_id, content, None).await;
    println!();

    println!(
        "{}",
        format!("5. Primary outage ({} -> vendorB)", OUTAGE_PROVIDER).bold()
    );
    let outage = seed(&runtime, &SeedCommand::new(OUTAGE_PROVIDER, Some("vendorB".to_string()))).await?;
    turn(&runtime, outage.tenant_id, outage.session_id, content, Some("demo-2")).await;
    println!();

    println!("{}", "Provider calls".bold());
    loop {
        match events.try_recv() {
            Ok(GatewayEvent::ProviderCall(call)) => {
                let status = match call.status {
                    CallStatus::Ok => call.status.as_str().green(),
                    CallStatus::Error => call.status.as_str().red(),
                };
                println!(
                    "  {:<16} {:<8} {:>5} ms  {}",
                    call.provider,
                    status,
                    call.latency_ms,
                    call.error_code.unwrap_or_default()
                );
            }
            Ok(_) | Err(EventBusError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    println!();

    let today = chrono::Utc::now().date_naive();
    let range = UsageRange::new(today, today)?;
    print_summary(&runtime.reports.usage(primary.tenant_id, range).await?);
    println!();
    print_summary(&runtime.reports.usage(outage.tenant_id, range).await?);

    Ok(())
}

/// Demo configuration: injected failures off unless requested, plus an
/// always-failing vendor-a upstream used to show fallback routing
pub fn demo_config(mut config: GatewayConfigManifest, keep_faults: bool) -> GatewayConfigManifest {
    if !keep_faults {
        for provider in &mut config.spec.providers {
            provider.faults = Some(FaultConfig::reliable());
        }
    }

    config.spec.reliability.base_delay_ms = config.spec.reliability.base_delay_ms.min(50);
    config.spec.reliability.max_delay_ms = config.spec.reliability.max_delay_ms.min(100);

    let price = config
        .spec
        .providers
        .iter()
        .find(|p| p.name == "vendorA")
        .map(|p| p.price_per_1k)
        .unwrap_or(0.002);
    config.spec.providers.retain(|p| p.name != OUTAGE_PROVIDER);
    config.spec.providers.push(ProviderConfig {
        name: OUTAGE_PROVIDER.to_string(),
        provider_type: ProviderType::VendorA,
        price_per_1k: price,
        enabled: true,
        faults: Some(FaultConfig {
            failure_rate: 1.0,
            ..FaultConfig::reliable()
        }),
    });
    config
}

async fn turn(
    runtime: &GatewayRuntime,
    tenant_id: TenantId,
    session_id: SessionId,
    content: &str,
    key: Option<&str>,
) -> Option<SendMessageResponse> {
    let request_id = Uuid::new_v4().to_string();
    let request = SendMessageRequest {
        tenant_id,
        session_id,
        content: content.to_string(),
        idempotency_key: key.map(str::to_string),
        request_id: request_id.clone(),
    };

    match runtime.gateway.send_message(request).await {
        Ok(response) => {
            println!("  {}", summarize(&response));
            Some(response)
        }
        Err(err) => {
            print_error(&err, &request_id);
            None
        }
    }
}

fn print_error(err: &GatewayError, request_id: &str) {
    let line = format!("  {} {}", err.status(), err.code()).yellow();
    println!("{}", line);
    if let Ok(body) = render_error(err, request_id) {
        for row in body.lines() {
            println!("    {}", row.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_config_adds_outage_provider_once() {
        let config = demo_config(GatewayConfigManifest::default(), false);
        let config = demo_config(config, false);

        let outages: Vec<_> = config
            .spec
            .providers
            .iter()
            .filter(|p| p.name == OUTAGE_PROVIDER)
            .collect();
        assert_eq!(outages.len(), 1);
        assert_eq!(outages[0].faults.as_ref().map(|f| f.failure_rate), Some(1.0));
        assert!(config.validate().is_ok());
        assert!(config.price_table().contains(OUTAGE_PROVIDER));
    }

    #[test]
    fn test_demo_config_disables_injected_failures() {
        let config = demo_config(GatewayConfigManifest::default(), false);
        let vendor_a = config.spec.providers.iter().find(|p| p.name == "vendorA").unwrap();
        assert_eq!(vendor_a.faults, Some(FaultConfig::reliable()));
    }

    #[tokio::test]
    async fn test_outage_agent_is_answered_by_fallback() {
        let runtime = GatewayRuntime::in_memory(demo_config(GatewayConfigManifest::default(), false)).unwrap();
        let ids = seed(&runtime, &SeedCommand::new(OUTAGE_PROVIDER, Some("vendorB".to_string())))
            .await
            .unwrap();

        let response = turn(&runtime, ids.tenant_id, ids.session_id, "Where is my order?", Some("k"))
            .await
            .unwrap();
        assert_eq!(response.provider, "vendorB");
        assert!(response.fallback_used);
    }
}
