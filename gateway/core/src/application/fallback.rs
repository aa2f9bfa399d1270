// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Fallback Router
//!
//! Drives the agent's provider chain: the primary provider first, then, on
//! any failure, the fallback provider with a fresh retry budget. Depth is
//! fixed at one hop. Every link that runs is audited exactly once with its
//! final outcome and wall-clock latency.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::application::audit::{CallAuditor, CallContext};
use crate::application::reliability::call_with_reliability;
use crate::domain::agent::Agent;
use crate::domain::errors::GatewayError;
use crate::domain::llm::{ChatCompletion, ChatMessage, ProviderError};
use crate::domain::reliability::RetryPolicy;
use crate::infrastructure::llm::ProviderRegistry;

/// Successful reply together with the link that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedCompletion {
    pub completion: ChatCompletion,
    pub provider: String,
    /// Wall-clock latency of the answering link, retries included
    pub latency_ms: u64,
    pub fallback_used: bool,
}

struct LinkOutcome {
    latency_ms: u64,
    result: Result<ChatCompletion, ProviderError>,
}

pub struct FallbackRouter {
    registry: Arc<ProviderRegistry>,
    policy: RetryPolicy,
    auditor: CallAuditor,
}

impl FallbackRouter {
    pub fn new(registry: Arc<ProviderRegistry>, policy: RetryPolicy, auditor: CallAuditor) -> Self {
        Self {
            registry,
            policy,
            auditor,
        }
    }

    /// Run the chain for `agent`. Fails with `Unavailable` when every link fails.
    pub async fn route(
        &self,
        agent: &Agent,
        ctx: &CallContext,
        messages: &[ChatMessage],
    ) -> Result<RoutedCompletion, GatewayError> {
        let primary = agent.primary_provider.as_str();
        let outcome = self.run_link(primary, ctx, messages).await?;
        let primary_err = match outcome.result {
            Ok(completion) => {
                return Ok(RoutedCompletion {
                    completion,
                    provider: primary.to_string(),
                    latency_ms: outcome.latency_ms,
                    fallback_used: false,
                });
            }
            Err(err) => err,
        };

        let Some(fallback) = agent.fallback_provider.as_deref() else {
            error!(
                provider = primary,
                error = %primary_err,
                request_id = %ctx.request_id,
                "Primary provider failed and no fallback is configured"
            );
            return Err(GatewayError::Unavailable);
        };

        warn!(
            primary,
            fallback,
            error = %primary_err,
            request_id = %ctx.request_id,
            "Primary provider failed, trying fallback provider"
        );

        let outcome = self.run_link(fallback, ctx, messages).await?;
        match outcome.result {
            Ok(completion) => {
                info!(provider = fallback, request_id = %ctx.request_id, "Fallback provider answered");
                Ok(RoutedCompletion {
                    completion,
                    provider: fallback.to_string(),
                    latency_ms: outcome.latency_ms,
                    fallback_used: true,
                })
            }
            Err(err) => {
                error!(
                    primary,
                    fallback,
                    error = %err,
                    request_id = %ctx.request_id,
                    "Primary and fallback providers both failed"
                );
                Err(GatewayError::Unavailable)
            }
        }
    }

    /// One audited chain link. Storage failures surface as the outer error.
    async fn run_link(
        &self,
        provider: &str,
        ctx: &CallContext,
        messages: &[ChatMessage],
    ) -> Result<LinkOutcome, GatewayError> {
        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| GatewayError::BadProvider(provider.to_string()))?;

        let started = Instant::now();
        let result = call_with_reliability(adapter.as_ref(), messages, &self.policy).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => self.auditor.record_success(ctx, provider, latency_ms).await?,
            Err(err) => self.auditor.record_failure(ctx, provider, latency_ms, err).await?,
        };

        Ok(LinkOutcome { latency_ms, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::CallStatus;
    use crate::domain::repository::ProviderCallRepository;
    use crate::domain::session::{Role, SessionId};
    use crate::domain::tenant::TenantId;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::llm::ScriptedProvider;
    use crate::infrastructure::repositories::InMemoryProviderCallRepository;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            call_timeout: Duration::from_millis(100),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: Duration::ZERO,
        }
    }

    struct Fixture {
        router: FallbackRouter,
        calls: Arc<InMemoryProviderCallRepository>,
        primary: Arc<ScriptedProvider>,
        fallback: Arc<ScriptedProvider>,
        ctx: CallContext,
    }

    fn fixture(primary: ScriptedProvider, fallback: ScriptedProvider) -> Fixture {
        let primary = Arc::new(primary);
        let fallback = Arc::new(fallback);
        let registry = ProviderRegistry::new()
            .with_provider(primary.clone())
            .with_provider(fallback.clone());
        let calls = Arc::new(InMemoryProviderCallRepository::new());
        let auditor = CallAuditor::new(calls.clone(), EventBus::new(16));

        Fixture {
            router: FallbackRouter::new(Arc::new(registry), policy(), auditor),
            calls,
            primary,
            fallback,
            ctx: CallContext {
                tenant_id: TenantId::new(),
                session_id: SessionId::new(),
                agent_id: crate::domain::agent::AgentId::new(),
                request_id: "req-1".to_string(),
            },
        }
    }

    fn agent(tenant_id: TenantId, fallback: Option<&str>) -> Agent {
        Agent::new(tenant_id, "Support", "vendorA", fallback.map(str::to_string), "Be helpful.", vec![]).unwrap()
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::new(Role::User, "Hello")]
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let f = fixture(ScriptedProvider::echo("vendorA"), ScriptedProvider::echo("vendorB"));
        let routed = f
            .router
            .route(&agent(f.ctx.tenant_id, Some("vendorB")), &f.ctx, &messages())
            .await
            .unwrap();

        assert_eq!(routed.provider, "vendorA");
        assert!(!routed.fallback_used);
        assert_eq!(f.fallback.calls(), 0);
        assert_eq!(f.calls.list_for_tenant(f.ctx.tenant_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_primary_error_still_falls_back() {
        let f = fixture(
            ScriptedProvider::failing("vendorA", ProviderError::http(400, "bad request")),
            ScriptedProvider::echo("vendorB"),
        );
        let routed = f
            .router
            .route(&agent(f.ctx.tenant_id, Some("vendorB")), &f.ctx, &messages())
            .await
            .unwrap();

        assert_eq!(routed.provider, "vendorB");
        assert!(routed.fallback_used);
        assert_eq!(routed.completion.text, "vendorB reply: Hello");
        assert_eq!(f.primary.calls(), 1);

        let audit = f.calls.list_for_tenant(f.ctx.tenant_id).await.unwrap();
        assert_eq!(audit.len(), 2);
        assert_eq!((audit[0].provider.as_str(), audit[0].status), ("vendorA", CallStatus::Error));
        assert_eq!(audit[0].error_code.as_deref(), Some("HTTP_400"));
        assert_eq!((audit[1].provider.as_str(), audit[1].status), ("vendorB", CallStatus::Ok));
    }

    #[tokio::test]
    async fn test_each_link_gets_full_retry_budget_and_one_audit() {
        let f = fixture(
            ScriptedProvider::failing("vendorA", ProviderError::http(500, "boom")),
            ScriptedProvider::failing("vendorB", ProviderError::rate_limited(Some(1))),
        );
        let err = f
            .router
            .route(&agent(f.ctx.tenant_id, Some("vendorB")), &f.ctx, &messages())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "PROVIDER_UNAVAILABLE");
        assert_eq!(f.primary.calls(), 3);
        assert_eq!(f.fallback.calls(), 3);
        assert_eq!(f.calls.list_for_tenant(f.ctx.tenant_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_fallback_is_unavailable() {
        let f = fixture(
            ScriptedProvider::failing("vendorA", ProviderError::Timeout),
            ScriptedProvider::echo("vendorB"),
        );
        let err = f
            .router
            .route(&agent(f.ctx.tenant_id, None), &f.ctx, &messages())
            .await
            .unwrap_err();

        assert_eq!(err.status(), 502);
        assert_eq!(f.fallback.calls(), 0);
        assert_eq!(f.calls.list_for_tenant(f.ctx.tenant_id).await.unwrap().len(), 1);
    }
}
