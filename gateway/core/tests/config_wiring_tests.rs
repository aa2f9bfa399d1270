// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end wiring from a configuration manifest: simulated vendors,
//! vendor adapters, registry, pricing and the gateway itself.

use std::sync::Arc;

use gateway_core::application::{GatewayRepositories, MessageGateway, StandardMessageGateway, UsageReportService};
use gateway_core::domain::agent::Agent;
use gateway_core::domain::billing::UsageRange;
use gateway_core::domain::gateway_config::{FaultConfig, GatewayConfigManifest};
use gateway_core::domain::session::Session;
use gateway_core::domain::tenant::Tenant;
use gateway_core::domain::turn::SendMessageRequest;
use gateway_core::infrastructure::event_bus::EventBus;
use gateway_core::infrastructure::llm::ProviderRegistry;

const MANIFEST: &str = r#"
apiVersion: message-gateway/v1
kind: GatewayConfig
metadata:
  name: wiring-test
spec:
  providers:
    - name: vendorA
      type: vendor-a
      price_per_1k: 0.002
      faults:
        failure_rate: 1.0
        latency_ms: [0, 1]
    - name: vendorB
      type: vendor-b
      price_per_1k: 0.003
      faults:
        failure_rate: 0.0
        latency_ms: [0, 2]
  reliability:
    call_timeout_ms: 200
    max_attempts: 2
    base_delay_ms: 1
    max_delay_ms: 5
    jitter_ms: 0
"#;

#[tokio::test]
async fn test_manifest_driven_gateway_falls_back_to_vendor_b() {
    let config = GatewayConfigManifest::from_yaml_str(MANIFEST).unwrap();
    config.validate().unwrap();

    let repos = GatewayRepositories::in_memory();
    let tenant = Tenant::new("Acme");
    repos.tenants.save(&tenant).await.unwrap();
    let agent = Agent::new(tenant.id, "Support", "vendorA", Some("vendorB".into()), "Be helpful.", vec![]).unwrap();
    repos.agents.save(&agent).await.unwrap();
    let session = Session::new(tenant.id, agent.id, "cust-1", serde_json::json!({}));
    repos.sessions.save(&session).await.unwrap();

    let registry = Arc::new(ProviderRegistry::from_config(&config).unwrap());
    let gateway = StandardMessageGateway::from_config(&config, &repos, registry, EventBus::default());

    let response = gateway
        .send_message(SendMessageRequest {
            tenant_id: tenant.id,
            session_id: session.id,
            content: "Hello there".to_string(),
            idempotency_key: Some("k-1".to_string()),
            request_id: "req-1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.provider, "vendorB");
    assert!(response.fallback_used);
    assert_eq!(response.reply, "VendorB reply: Hello there");
    assert_eq!(response.tokens_in, 2);
    assert_eq!(response.tokens_out, 6);
    assert!((response.cost_usd - 8.0 / 1000.0 * 0.003).abs() < 1e-12);

    let today = chrono::Utc::now().date_naive();
    let summary = UsageReportService::new(repos.usage.clone(), repos.agents.clone())
        .usage(tenant.id, UsageRange::new(today, today).unwrap())
        .await
        .unwrap();
    assert_eq!(summary.totals.sessions, 1);
    assert_eq!(summary.by_provider[0].provider, "vendorB");
    assert_eq!(summary.top_agents[0].agent_name, "Support");
}

#[test]
fn test_reliable_fault_profile_is_valid() {
    let mut config = GatewayConfigManifest::default();
    for provider in &mut config.spec.providers {
        provider.faults = Some(FaultConfig::reliable());
    }
    assert!(config.validate().is_ok());
}
