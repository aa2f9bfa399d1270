// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for `StandardMessageGateway::send_message`.
//!
//! Every test runs the full turn against in-memory repositories and scripted
//! providers, then asserts on the persisted side effects:
//! - idempotent replay and conflicting key reuse
//! - fallback routing and provider unavailability
//! - tenant isolation and input validation
//! - at-most-once billing under concurrent requests sharing a key
//! - reservation recovery after cancelled turns and expired leases
//! - idempotency storage failures after billing

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gateway_core::application::{GatewayRepositories, IdempotencyWait, MessageGateway, StandardMessageGateway};
use gateway_core::domain::agent::Agent;
use gateway_core::domain::billing::PriceTable;
use gateway_core::domain::errors::GatewayError;
use gateway_core::domain::events::{CallStatus, GatewayEvent};
use gateway_core::domain::idempotency::{request_hash, IdempotencyRecord, Reservation, ReservationLease};
use gateway_core::domain::llm::ProviderError;
use gateway_core::domain::reliability::RetryPolicy;
use gateway_core::domain::repository::{IdempotencyRepository, RepositoryError};
use gateway_core::domain::session::{Role, Session, SessionId};
use gateway_core::domain::tenant::{Tenant, TenantId};
use gateway_core::domain::turn::{SendMessageRequest, SendMessageResponse};
use gateway_core::infrastructure::event_bus::EventBus;
use gateway_core::infrastructure::llm::scripted::ScriptStep;
use gateway_core::infrastructure::llm::{ProviderRegistry, ScriptedProvider};

struct Harness {
    gateway: Arc<StandardMessageGateway>,
    repos: GatewayRepositories,
    event_bus: EventBus,
    primary: Arc<ScriptedProvider>,
    fallback: Arc<ScriptedProvider>,
    tenant: TenantId,
    session: Session,
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        call_timeout: Duration::from_millis(500),
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: Duration::ZERO,
    }
}

async fn harness_with(
    primary: ScriptedProvider,
    fallback: ScriptedProvider,
    agent_primary: &str,
    agent_fallback: Option<&str>,
    wait: IdempotencyWait,
) -> Harness {
    harness_on(
        GatewayRepositories::in_memory(),
        primary,
        fallback,
        agent_primary,
        agent_fallback,
        wait,
    )
    .await
}

async fn harness_on(
    repos: GatewayRepositories,
    primary: ScriptedProvider,
    fallback: ScriptedProvider,
    agent_primary: &str,
    agent_fallback: Option<&str>,
    wait: IdempotencyWait,
) -> Harness {
    let tenant = Tenant::new("Acme");
    repos.tenants.save(&tenant).await.unwrap();

    let agent = Agent::new(
        tenant.id,
        "Support Bot",
        agent_primary,
        agent_fallback.map(str::to_string),
        "You are a helpful support agent.",
        vec!["InvoiceLookup".to_string()],
    )
    .unwrap();
    repos.agents.save(&agent).await.unwrap();

    let session = Session::new(tenant.id, agent.id, "cust-42", serde_json::json!({ "channel": "web" }));
    repos.sessions.save(&session).await.unwrap();

    let primary = Arc::new(primary);
    let fallback = Arc::new(fallback);
    let registry = ProviderRegistry::new()
        .with_provider(primary.clone())
        .with_provider(fallback.clone());
    let prices = PriceTable::new().with_price("vendorA", 0.002).with_price("vendorB", 0.003);
    let event_bus = EventBus::new(256);

    let gateway = StandardMessageGateway::new(&repos, Arc::new(registry), prices, fast_policy(), event_bus.clone())
        .with_idempotency_wait(wait);

    Harness {
        gateway: Arc::new(gateway),
        repos,
        event_bus,
        primary,
        fallback,
        tenant: tenant.id,
        session,
    }
}

async fn harness(primary: ScriptedProvider, fallback: ScriptedProvider, agent_fallback: Option<&str>) -> Harness {
    harness_with(primary, fallback, "vendorA", agent_fallback, IdempotencyWait::default()).await
}

impl Harness {
    fn request(&self, content: &str, key: Option<&str>) -> SendMessageRequest {
        SendMessageRequest {
            tenant_id: self.tenant,
            session_id: self.session.id,
            content: content.to_string(),
            idempotency_key: key.map(str::to_string),
            request_id: format!("req-{}", uuid::Uuid::new_v4()),
        }
    }

    async fn send(&self, content: &str, key: &str) -> Result<SendMessageResponse, GatewayError> {
        self.gateway.send_message(self.request(content, Some(key))).await
    }

    async fn message_count(&self) -> usize {
        self.repos
            .messages
            .list_for_session(self.tenant, self.session.id)
            .await
            .unwrap()
            .len()
    }

    async fn usage_count(&self) -> usize {
        self.repos.usage.list_for_tenant(self.tenant).await.unwrap().len()
    }

    async fn provider_call_count(&self) -> usize {
        self.repos.provider_calls.list_for_tenant(self.tenant).await.unwrap().len()
    }
}

#[tokio::test]
async fn test_replay_returns_identical_response_without_new_side_effects() {
    let h = harness(ScriptedProvider::echo("vendorA"), ScriptedProvider::echo("vendorB"), Some("vendorB")).await;
    let mut events = h.event_bus.subscribe_tenant(h.tenant);

    let first = h.send("Hello", "key-1").await.unwrap();
    let second = h.send("Hello", "key-1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.reply, "vendorA reply: Hello");
    assert_eq!(first.provider, "vendorA");
    assert!(!first.fallback_used);
    assert_eq!(h.primary.calls(), 1);
    assert_eq!(h.usage_count().await, 1);
    assert_eq!(h.message_count().await, 2);
    assert_eq!(h.provider_call_count().await, 1);

    let mut saw_replay = false;
    for _ in 0..3 {
        if let GatewayEvent::IdempotentReplay { idempotency_key, .. } = events.recv().await.unwrap() {
            assert_eq!(idempotency_key, "key-1");
            saw_replay = true;
            break;
        }
    }
    assert!(saw_replay);
}

#[tokio::test]
async fn test_key_reuse_with_different_content_conflicts() {
    let h = harness(ScriptedProvider::echo("vendorA"), ScriptedProvider::echo("vendorB"), None).await;

    h.send("Hello", "key-1").await.unwrap();
    let err = h.send("Hello again", "key-1").await.unwrap_err();

    assert!(matches!(err, GatewayError::Conflict));
    assert_eq!(err.code(), "IDEMPOTENCY_CONFLICT");
    assert_eq!(err.status(), 409);
    assert_eq!(h.message_count().await, 2);
    assert_eq!(h.usage_count().await, 1);
}

#[tokio::test]
async fn test_fallback_answers_when_primary_fails() {
    let h = harness(
        ScriptedProvider::failing("vendorA", ProviderError::http(500, "VendorA internal error")),
        ScriptedProvider::echo("vendorB"),
        Some("vendorB"),
    )
    .await;

    let response = h.send("Where is my invoice?", "key-1").await.unwrap();

    assert!(response.fallback_used);
    assert_eq!(response.provider, "vendorB");
    assert_eq!(response.reply, "vendorB reply: Where is my invoice?");
    assert_eq!(h.primary.calls(), 3);
    assert_eq!(h.fallback.calls(), 1);

    let usage = h.repos.usage.list_for_tenant(h.tenant).await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].provider, "vendorB");
    assert!((response.cost_usd - usage[0].cost_usd).abs() < 1e-12);

    let calls = h.repos.provider_calls.list_for_tenant(h.tenant).await.unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].status, CallStatus::Error);
    assert_eq!(calls[0].error_code.as_deref(), Some("HTTP_500"));
    assert_eq!(calls[1].status, CallStatus::Ok);
    assert!(calls.iter().all(|c| c.request_id == response.request_id));
}

#[tokio::test]
async fn test_no_fallback_is_unavailable_and_unbilled() {
    let h = harness(
        ScriptedProvider::failing("vendorA", ProviderError::Timeout),
        ScriptedProvider::echo("vendorB"),
        None,
    )
    .await;

    let err = h.send("Hello", "key-1").await.unwrap_err();

    assert_eq!(err.code(), "PROVIDER_UNAVAILABLE");
    assert_eq!(err.status(), 502);
    assert_eq!(h.usage_count().await, 0);
    assert_eq!(h.fallback.calls(), 0);
    // The user message is written before the provider call and kept
    let messages = h.repos.messages.list_for_session(h.tenant, h.session.id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
    assert!(h.repos.idempotency.find(h.tenant, "key-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_turn_releases_key_for_retry() {
    let primary = ScriptedProvider::echo("vendorA").then(ScriptStep::Fail(ProviderError::http(400, "bad request")));
    let h = harness(primary, ScriptedProvider::echo("vendorB"), None).await;

    assert!(h.send("Hello", "key-1").await.is_err());
    let retried = h.send("Hello", "key-1").await.unwrap();

    assert_eq!(retried.provider, "vendorA");
    assert_eq!(h.primary.calls(), 2);
    assert_eq!(h.usage_count().await, 1);
}

#[tokio::test]
async fn test_model_context_is_system_prompt_plus_transcript() {
    let h = harness(ScriptedProvider::echo("vendorA"), ScriptedProvider::echo("vendorB"), None).await;

    h.send("First question", "key-1").await.unwrap();
    h.send("Second question", "key-2").await.unwrap();

    let contexts = h.primary.contexts();
    assert_eq!(contexts.len(), 2);

    let second: Vec<(Role, &str)> = contexts[1].iter().map(|m| (m.role, m.content.as_str())).collect();
    assert_eq!(
        second,
        vec![
            (Role::System, "You are a helpful support agent."),
            (Role::User, "First question"),
            (Role::Assistant, "vendorA reply: First question"),
            (Role::User, "Second question"),
        ]
    );
}

#[tokio::test]
async fn test_cross_tenant_session_is_not_found() {
    let h = harness(ScriptedProvider::echo("vendorA"), ScriptedProvider::echo("vendorB"), None).await;

    let mut request = h.request("Hello", Some("key-1"));
    request.tenant_id = TenantId::new();
    let err = h.gateway.send_message(request).await.unwrap_err();

    assert_eq!(err.code(), "SESSION_NOT_FOUND");
    assert_eq!(err.status(), 404);
    assert_eq!(h.message_count().await, 0);
    assert_eq!(h.primary.calls(), 0);

    let mut request = h.request("Hello", Some("key-1"));
    request.session_id = SessionId::new();
    assert_eq!(h.gateway.send_message(request).await.unwrap_err().code(), "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_missing_idempotency_key_fails_first() {
    let h = harness(ScriptedProvider::echo("vendorA"), ScriptedProvider::echo("vendorB"), None).await;

    let err = h.gateway.send_message(h.request("Hello", None)).await.unwrap_err();
    assert_eq!(err.code(), "MISSING_IDEMPOTENCY_KEY");
    assert_eq!(err.status(), 400);

    let err = h.gateway.send_message(h.request("Hello", Some(""))).await.unwrap_err();
    assert_eq!(err.code(), "MISSING_IDEMPOTENCY_KEY");

    // Validated before the session lookup
    let mut request = h.request("Hello", None);
    request.session_id = SessionId::new();
    assert_eq!(h.gateway.send_message(request).await.unwrap_err().code(), "MISSING_IDEMPOTENCY_KEY");

    let err = h.send("   ", "key-1").await.unwrap_err();
    assert_eq!(err.code(), "BAD_REQUEST");
    assert_eq!(h.message_count().await, 0);
}

#[tokio::test]
async fn test_unknown_provider_is_rejected_before_side_effects() {
    let h = harness_with(
        ScriptedProvider::echo("vendorA"),
        ScriptedProvider::echo("vendorB"),
        "vendorZ",
        Some("vendorA"),
        IdempotencyWait::default(),
    )
    .await;

    let err = h.send("Hello", "key-1").await.unwrap_err();

    assert_eq!(err.code(), "BAD_PROVIDER");
    assert_eq!(err.status(), 400);
    assert_eq!(h.message_count().await, 0);
    assert_eq!(h.provider_call_count().await, 0);
    // The key was never reserved
    let lease = ReservationLease::new(Duration::from_secs(60));
    let reservation = h.repos.idempotency.reserve(h.tenant, "key-1", "any-hash", &lease).await.unwrap();
    assert_eq!(reservation, Reservation::Acquired);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_billed_execution() {
    let h = harness(
        ScriptedProvider::echo("vendorA").with_latency(Duration::from_millis(50)),
        ScriptedProvider::echo("vendorB"),
        Some("vendorB"),
    )
    .await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gateway = h.gateway.clone();
            let request = h.request("Hello", Some("shared-key"));
            tokio::spawn(async move { gateway.send_message(request).await })
        })
        .collect();

    let responses: Vec<SendMessageResponse> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert!(responses.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(h.primary.calls(), 1);
    assert_eq!(h.usage_count().await, 1);
    assert_eq!(h.provider_call_count().await, 1);
    assert_eq!(h.message_count().await, 2);
}

#[tokio::test]
async fn test_waiting_on_in_flight_key_gives_up() {
    let wait = IdempotencyWait {
        max_wait: Duration::from_millis(20),
        poll_interval: Duration::from_millis(5),
    };
    let h = harness_with(
        ScriptedProvider::echo("vendorA").with_latency(Duration::from_millis(300)),
        ScriptedProvider::echo("vendorB"),
        "vendorA",
        None,
        wait,
    )
    .await;

    let gateway = h.gateway.clone();
    let first_request = h.request("Hello", Some("slow-key"));
    let first = tokio::spawn(async move { gateway.send_message(first_request).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = h.send("Hello", "slow-key").await.unwrap_err();
    assert_eq!(err.code(), "IDEMPOTENCY_IN_PROGRESS");
    assert_eq!(err.status(), 409);

    // A different payload on the held key conflicts immediately
    assert_eq!(h.send("Other", "slow-key").await.unwrap_err().code(), "IDEMPOTENCY_CONFLICT");

    let completed = first.await.unwrap().unwrap();
    assert_eq!(h.send("Hello", "slow-key").await.unwrap(), completed);
    assert_eq!(h.primary.calls(), 1);
}

#[tokio::test]
async fn test_reply_usage_is_billed_from_completion() {
    let primary = ScriptedProvider::new(
        "vendorA",
        ScriptStep::Reply {
            text: "Your invoice is on its way.".to_string(),
            tokens_in: 400,
            tokens_out: 600,
        },
    );
    let h = harness(primary, ScriptedProvider::echo("vendorB"), None).await;

    let response = h.send("Invoice?", "key-1").await.unwrap();

    assert_eq!((response.tokens_in, response.tokens_out), (400, 600));
    assert!((response.cost_usd - 0.002).abs() < 1e-12);

    let transcript = h.repos.messages.list_for_session(h.tenant, h.session.id).await.unwrap();
    assert_eq!(transcript[1].id, response.assistant_message_id);
    assert_eq!(transcript[1].content, "Your invoice is on its way.");
}

#[tokio::test]
async fn test_cancelled_turn_releases_key_for_retry() {
    let h = harness(
        ScriptedProvider::echo("vendorA").with_latency(Duration::from_millis(200)),
        ScriptedProvider::echo("vendorB"),
        None,
    )
    .await;

    // Caller gives up while the provider is still working
    let abandoned = tokio::time::timeout(Duration::from_millis(20), h.send("Hello", "key-1")).await;
    assert!(abandoned.is_err());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = h.send("Hello", "key-1").await.unwrap();

    assert_eq!(response.reply, "vendorA reply: Hello");
    assert_eq!(h.usage_count().await, 1);
    assert_eq!(h.send("Hello", "key-1").await.unwrap(), response);
}

#[tokio::test]
async fn test_expired_reservation_of_crashed_holder_is_taken_over() {
    let wait = IdempotencyWait {
        max_wait: Duration::from_millis(500),
        poll_interval: Duration::from_millis(5),
    };
    let h = harness_with(
        ScriptedProvider::echo("vendorA"),
        ScriptedProvider::echo("vendorB"),
        "vendorA",
        None,
        wait,
    )
    .await;

    // A holder that reserved the key and never came back
    let hash = request_hash(&h.session.id, &h.session.agent_id, "Hello");
    let crashed = ReservationLease::new(Duration::from_millis(30));
    let reservation = h.repos.idempotency.reserve(h.tenant, "key-1", &hash, &crashed).await.unwrap();
    assert_eq!(reservation, Reservation::Acquired);

    let response = h.send("Hello", "key-1").await.unwrap();

    assert_eq!(response.reply, "vendorA reply: Hello");
    assert_eq!(h.primary.calls(), 1);
    assert_eq!(h.usage_count().await, 1);
}

/// How the wrapped repository answers `create`
enum CreateBehaviour {
    /// Storage errors for the first `n` calls, then delegate
    FailStorage(u32),
    /// Another request completed the key first with `reply`
    CompletedElsewhere { reply: String },
    /// Duplicate key reported but nothing completed is readable
    DuplicateWithoutRecord,
}

struct CreateOverride {
    inner: Arc<dyn IdempotencyRepository>,
    behaviour: CreateBehaviour,
    creates: AtomicU32,
}

impl CreateOverride {
    fn wrap(repos: &mut GatewayRepositories, behaviour: CreateBehaviour) -> Arc<Self> {
        let wrapped = Arc::new(Self {
            inner: repos.idempotency.clone(),
            behaviour,
            creates: AtomicU32::new(0),
        });
        repos.idempotency = wrapped.clone();
        wrapped
    }

    fn creates(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdempotencyRepository for CreateOverride {
    async fn find(&self, tenant_id: TenantId, key: &str) -> Result<Option<IdempotencyRecord>, RepositoryError> {
        self.inner.find(tenant_id, key).await
    }

    async fn reserve(
        &self,
        tenant_id: TenantId,
        key: &str,
        request_hash: &str,
        lease: &ReservationLease,
    ) -> Result<Reservation, RepositoryError> {
        self.inner.reserve(tenant_id, key, request_hash, lease).await
    }

    async fn create(
        &self,
        tenant_id: TenantId,
        key: &str,
        request_hash: &str,
        response: &SendMessageResponse,
    ) -> Result<IdempotencyRecord, RepositoryError> {
        let call = self.creates.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            CreateBehaviour::FailStorage(failures) if call < *failures => {
                Err(RepositoryError::Database("connection reset".to_string()))
            }
            CreateBehaviour::FailStorage(_) => self.inner.create(tenant_id, key, request_hash, response).await,
            CreateBehaviour::CompletedElsewhere { reply } => {
                let stored = SendMessageResponse {
                    reply: reply.clone(),
                    ..response.clone()
                };
                self.inner.create(tenant_id, key, request_hash, &stored).await?;
                Err(RepositoryError::DuplicateKey(key.to_string()))
            }
            CreateBehaviour::DuplicateWithoutRecord => Err(RepositoryError::DuplicateKey(key.to_string())),
        }
    }

    async fn release(&self, tenant_id: TenantId, key: &str, token: uuid::Uuid) -> Result<(), RepositoryError> {
        self.inner.release(tenant_id, key, token).await
    }
}

async fn harness_with_create(behaviour: CreateBehaviour) -> (Harness, Arc<CreateOverride>) {
    let mut repos = GatewayRepositories::in_memory();
    let wrapped = CreateOverride::wrap(&mut repos, behaviour);
    let wait = IdempotencyWait {
        max_wait: Duration::from_millis(20),
        poll_interval: Duration::from_millis(5),
    };
    let h = harness_on(
        repos,
        ScriptedProvider::echo("vendorA"),
        ScriptedProvider::echo("vendorB"),
        "vendorA",
        None,
        wait,
    )
    .await;
    (h, wrapped)
}

#[tokio::test]
async fn test_transient_record_failure_is_retried() {
    let (h, wrapped) = harness_with_create(CreateBehaviour::FailStorage(1)).await;

    let response = h.send("Hello", "key-1").await.unwrap();

    assert_eq!(wrapped.creates(), 2);
    assert_eq!(h.usage_count().await, 1);
    assert_eq!(h.send("Hello", "key-1").await.unwrap(), response);
    assert_eq!(h.primary.calls(), 1);
}

#[tokio::test]
async fn test_billed_turn_keeps_key_reserved_when_record_cannot_be_stored() {
    let (h, wrapped) = harness_with_create(CreateBehaviour::FailStorage(u32::MAX)).await;

    let err = h.send("Hello", "key-1").await.unwrap_err();
    assert_eq!(err.code(), "INTERNAL_ERROR");
    assert_eq!(err.status(), 500);
    assert_eq!(wrapped.creates(), 3);
    assert_eq!(h.usage_count().await, 1);

    // The retry must not bill the same turn again
    let retry = h.send("Hello", "key-1").await.unwrap_err();
    assert_eq!(retry.code(), "IDEMPOTENCY_IN_PROGRESS");
    assert_eq!(h.primary.calls(), 1);
    assert_eq!(h.usage_count().await, 1);
}

#[tokio::test]
async fn test_key_completed_concurrently_returns_stored_response() {
    let (h, _) = harness_with_create(CreateBehaviour::CompletedElsewhere {
        reply: "stored reply".to_string(),
    })
    .await;

    let response = h.send("Hello", "key-1").await.unwrap();

    assert_eq!(response.reply, "stored reply");
    let replay = h.send("Hello", "key-1").await.unwrap();
    assert_eq!(replay, response);
    assert_eq!(h.primary.calls(), 1);
}

#[tokio::test]
async fn test_duplicate_key_without_stored_record_is_internal_error() {
    let (h, wrapped) = harness_with_create(CreateBehaviour::DuplicateWithoutRecord).await;

    let err = h.send("Hello", "key-1").await.unwrap_err();

    assert_eq!(err.code(), "INTERNAL_ERROR");
    assert_eq!(wrapped.creates(), 1);
    assert_eq!(h.usage_count().await, 1);
}
