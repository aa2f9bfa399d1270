// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process-owned gateway runtime
//!
//! Builds every service a command needs from one configuration manifest.
//! The store is created here and dropped with the runtime; nothing is held in
//! a process-wide global.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use gateway_core::{
    application::{
        create_repositories, AgentService, GatewayRepositories, SessionService,
        StandardMessageGateway, UsageReportService,
    },
    domain::gateway_config::GatewayConfigManifest,
    domain::repository::StorageBackend,
    infrastructure::{db::Database, event_bus::EventBus, llm::ProviderRegistry},
};

pub struct GatewayRuntime {
    pub config: GatewayConfigManifest,
    pub repositories: GatewayRepositories,
    pub registry: Arc<ProviderRegistry>,
    pub event_bus: EventBus,
    pub gateway: StandardMessageGateway,
    pub agents: AgentService,
    pub sessions: SessionService,
    pub reports: UsageReportService,
}

impl GatewayRuntime {
    /// Load, validate and wire the configured backend.
    ///
    /// Commands whose effects must outlive the process require PostgreSQL.
    pub async fn connect(config_path: Option<PathBuf>) -> Result<Self> {
        let config = load_config(config_path)?;

        let backend = config.storage_backend();
        let pool = match &backend {
            StorageBackend::PostgreSQL(pg) => {
                let database = Database::from_config(pg).await?;
                Some(database.get_pool().clone())
            }
            StorageBackend::InMemory => anyhow::bail!(
                "No database configured. Set spec.database.url or MGW_DATABASE_URL \
                 (use `mgw demo` for an in-memory run)"
            ),
        };

        let repositories = create_repositories(&backend, pool)?;
        Self::assemble(config, repositories)
    }

    /// Wire an in-memory store; state is lost when the runtime is dropped
    pub fn in_memory(config: GatewayConfigManifest) -> Result<Self> {
        config
            .validate()
            .context("Configuration validation failed")?;
        Self::assemble(config, GatewayRepositories::in_memory())
    }

    fn assemble(config: GatewayConfigManifest, repositories: GatewayRepositories) -> Result<Self> {
        let registry = Arc::new(
            ProviderRegistry::from_config(&config).context("Failed to initialize providers")?,
        );
        let event_bus = EventBus::default();

        let gateway = StandardMessageGateway::from_config(
            &config,
            &repositories,
            registry.clone(),
            event_bus.clone(),
        );
        let agents = AgentService::new(repositories.tenants.clone(), repositories.agents.clone());
        let sessions = SessionService::new(
            repositories.agents.clone(),
            repositories.sessions.clone(),
            repositories.messages.clone(),
        );
        let reports = UsageReportService::new(repositories.usage.clone(), repositories.agents.clone());

        info!(providers = ?registry.provider_names(), "Gateway runtime ready");

        Ok(Self {
            config,
            repositories,
            registry,
            event_bus,
            gateway,
            agents,
            sessions,
            reports,
        })
    }
}

/// Discover, load and validate the configuration manifest
pub fn load_config(config_path: Option<PathBuf>) -> Result<GatewayConfigManifest> {
    let config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}
