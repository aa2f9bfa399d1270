// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for a message gateway node:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Upstream provider registry entries with their price per 1k tokens
// - Reliability controls (timeout, retry, backoff)
// - Idempotency reservation waiting behaviour
// - Database connection settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::billing::PriceTable;
use crate::domain::reliability::RetryPolicy;
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "message-gateway/v1";
pub const KIND: &str = "GatewayConfig";
pub const CONFIG_PATH_ENV: &str = "MGW_CONFIG_PATH";

/// Top-level Kubernetes-style gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "message-gateway/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: GatewayConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    /// Upstream providers available to agents
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub reliability: ReliabilityConfig,

    #[serde(default)]
    pub idempotency: IdempotencyConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    /// Flat `{outputText, tokensIn, tokensOut}` response shape
    VendorA,
    /// Chat-completions `{choices[].message.content, usage}` response shape
    VendorB,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier referenced by agents (e.g. "vendorA")
    pub name: String,

    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// USD per 1,000 tokens (input + output)
    pub price_per_1k: f64,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Injected upstream failure/latency behaviour; vendor defaults when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faults: Option<FaultConfig>,
}

/// Failure and latency profile of a simulated upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Probability in [0, 1] that a call fails (HTTP 500 for vendor-a, 429 for vendor-b)
    #[serde(default)]
    pub failure_rate: f64,

    /// Probability in [0, 1] that a call takes the slow latency range
    #[serde(default)]
    pub slow_rate: f64,

    pub latency_ms: (u64, u64),

    #[serde(default)]
    pub slow_latency_ms: (u64, u64),

    /// Range of the retry-after hint attached to rate-limit failures
    #[serde(default)]
    pub retry_after_ms: (u64, u64),
}

impl FaultConfig {
    pub fn vendor_a_default() -> Self {
        Self {
            failure_rate: 0.10,
            slow_rate: 0.20,
            latency_ms: (120, 320),
            slow_latency_ms: (1800, 2600),
            retry_after_ms: (0, 0),
        }
    }

    pub fn vendor_b_default() -> Self {
        Self {
            failure_rate: 0.15,
            slow_rate: 0.0,
            latency_ms: (100, 400),
            slow_latency_ms: (0, 0),
            retry_after_ms: (250, 1000),
        }
    }

    /// No injected failures and near-zero latency
    pub fn reliable() -> Self {
        Self {
            failure_rate: 0.0,
            slow_rate: 0.0,
            latency_ms: (0, 5),
            slow_latency_ms: (0, 0),
            retry_after_ms: (0, 0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

impl ReliabilityConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// How long a request waits for a concurrent holder of the same key
    #[serde(default = "default_in_flight_wait")]
    pub in_flight_wait_ms: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string; in-memory storage when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_true() -> bool {
    true
}

fn default_call_timeout() -> u64 {
    1500
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    200
}

fn default_max_delay() -> u64 {
    2000
}

fn default_jitter() -> u64 {
    80
}

fn default_in_flight_wait() -> u64 {
    10_000
}

fn default_poll_interval() -> u64 {
    25
}

fn default_max_connections() -> u32 {
    5
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "vendorA".to_string(),
            provider_type: ProviderType::VendorA,
            price_per_1k: 0.002,
            enabled: true,
            faults: None,
        },
        ProviderConfig {
            name: "vendorB".to_string(),
            provider_type: ProviderType::VendorB,
            price_per_1k: 0.003,
            enabled: true,
            faults: None,
        },
    ]
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter_ms: default_jitter(),
        }
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            in_flight_wait_ms: default_in_flight_wait(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for GatewayConfigSpec {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            reliability: ReliabilityConfig::default(),
            idempotency: IdempotencyConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "message-gateway".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: GatewayConfigSpec::default(),
        }
    }
}

impl GatewayConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. MGW_CONFIG_PATH environment variable
    /// 2. ./mgw-config.yaml (working directory)
    /// 3. ~/.mgw/config.yaml (user home)
    /// 4. /etc/mgw/config.yaml (system, Unix) or C:\ProgramData\Mgw\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./mgw-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mgw").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/mgw/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Mgw\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?
        } else if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MGW_DATABASE_URL") {
            tracing::info!("Environment override: MGW_DATABASE_URL");
            self.spec.database.url = Some(url);
        }

        let reliability = &mut self.spec.reliability;
        override_number(&lookup, "MGW_VENDOR_TIMEOUT_MS", &mut reliability.call_timeout_ms);
        override_number(&lookup, "MGW_RETRY_MAX_ATTEMPTS", &mut reliability.max_attempts);
        override_number(&lookup, "MGW_RETRY_BASE_DELAY_MS", &mut reliability.base_delay_ms);
        override_number(&lookup, "MGW_RETRY_MAX_DELAY_MS", &mut reliability.max_delay_ms);

        for provider in &mut self.spec.providers {
            let var = format!("MGW_PRICE_{}_PER_1K", env_segment(&provider.name));
            override_number(&lookup, &var, &mut provider.price_per_1k);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = HashSet::new();
        for provider in &self.spec.providers {
            if provider.name.is_empty() {
                anyhow::bail!("Provider name cannot be empty");
            }
            if !seen.insert(provider.name.as_str()) {
                anyhow::bail!("Duplicate provider name: {}", provider.name);
            }
            if !provider.price_per_1k.is_finite() || provider.price_per_1k < 0.0 {
                anyhow::bail!(
                    "Provider '{}' price_per_1k must be a non-negative number",
                    provider.name
                );
            }
            if let Some(faults) = &provider.faults {
                for (label, rate) in [("failure_rate", faults.failure_rate), ("slow_rate", faults.slow_rate)] {
                    if !(0.0..=1.0).contains(&rate) {
                        anyhow::bail!("Provider '{}' {} must be within [0, 1]", provider.name, label);
                    }
                }
            }
        }

        let reliability = &self.spec.reliability;
        if reliability.max_attempts == 0 {
            anyhow::bail!("reliability.max_attempts must be at least 1");
        }
        if reliability.call_timeout_ms == 0 {
            anyhow::bail!("reliability.call_timeout_ms must be positive");
        }
        if reliability.base_delay_ms > reliability.max_delay_ms {
            anyhow::bail!("reliability.base_delay_ms cannot exceed reliability.max_delay_ms");
        }

        if self.spec.idempotency.poll_interval_ms == 0 {
            anyhow::bail!("idempotency.poll_interval_ms must be positive");
        }

        Ok(())
    }

    /// Price table built from the enabled providers
    pub fn price_table(&self) -> PriceTable {
        let mut table = PriceTable::new();
        for provider in self.spec.providers.iter().filter(|p| p.enabled) {
            table.set_price(provider.name.clone(), provider.price_per_1k);
        }
        table
    }

    pub fn storage_backend(&self) -> StorageBackend {
        match &self.spec.database.url {
            Some(url) => StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: url.clone(),
                max_connections: self.spec.database.max_connections,
            }),
            None => StorageBackend::InMemory,
        }
    }
}

fn override_number<F, T>(lookup: &F, name: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        match raw.trim().parse::<T>() {
            Ok(value) => {
                tracing::info!("Environment override: {}={}", name, value);
                *target = value;
            }
            Err(_) => {
                tracing::warn!("Invalid value for {}: '{}'. Ignoring.", name, raw);
            }
        }
    }
}

/// `vendorA` -> `VENDORA`, `vendor-b` -> `VENDOR_B`
fn env_segment(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
