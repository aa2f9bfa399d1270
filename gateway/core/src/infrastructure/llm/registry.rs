// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Registry - Provider Identifier Resolution
//
// Maps a provider identifier (e.g. "vendorA") to its adapter. The gateway
// never branches on provider names; adding a provider means adding an
// entry here.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::simulated::SimulatedUpstream;
use super::vendor_a::VendorAAdapter;
use super::vendor_b::VendorBAdapter;
use crate::domain::gateway_config::{GatewayConfigManifest, ProviderConfig, ProviderType};
use crate::domain::llm::ProviderAdapter;

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create provider registry from gateway configuration
    pub fn from_config(config: &GatewayConfigManifest) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        info!("Initializing provider registry");

        for provider_config in &config.spec.providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            info!(
                "Initializing provider: {} ({:?})",
                provider_config.name, provider_config.provider_type
            );
            registry.register(Self::create_provider(provider_config));
        }

        if registry.providers.is_empty() {
            warn!("No providers configured - every sendMessage will fail with BAD_PROVIDER");
        }

        Ok(registry)
    }

    /// Create a provider instance backed by a simulated upstream
    fn create_provider(config: &ProviderConfig) -> Arc<dyn ProviderAdapter> {
        let upstream = Arc::new(match &config.faults {
            Some(faults) => SimulatedUpstream::new(config.provider_type.clone(), faults.clone()),
            None => SimulatedUpstream::with_default_faults(config.provider_type.clone()),
        });

        match config.provider_type {
            ProviderType::VendorA => Arc::new(VendorAAdapter::new(config.name.clone(), upstream)),
            ProviderType::VendorB => Arc::new(VendorBAdapter::new(config.name.clone(), upstream)),
        }
    }

    /// Register an adapter under its own name, replacing any previous entry
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let name = adapter.name().to_string();
        if self.providers.insert(name.clone(), adapter).is_some() {
            warn!("Provider '{}' registered twice; keeping the latest adapter", name);
        }
    }

    pub fn with_provider(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider identifiers, sorted
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::ScriptedProvider;

    #[test]
    fn test_registry_creation() {
        let mut config = GatewayConfigManifest::default();
        config.spec.providers[1].enabled = false;

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.contains("vendorA"));
        assert!(!registry.contains("vendorB"));
        assert_eq!(registry.provider_names(), vec!["vendorA".to_string()]);
        assert_eq!(registry.get("vendorA").unwrap().name(), "vendorA");
    }

    #[test]
    fn test_register_replaces_by_name() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(ScriptedProvider::echo("vendorA")))
            .with_provider(Arc::new(ScriptedProvider::echo("vendorA")))
            .with_provider(Arc::new(ScriptedProvider::echo("vendorB")));

        assert_eq!(registry.provider_names(), vec!["vendorA", "vendorB"]);
        assert!(registry.get("vendorZ").is_none());
    }
}
