// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Billing Domain
//!
//! Price table, cost computation and usage rollup read models.
//!
//! Cost is linear in total tokens: `(tokens_in + tokens_out) / 1000 * price_per_1k`.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::agent::AgentId;
use crate::domain::errors::GatewayError;

/// Per-provider USD price for 1,000 tokens (input and output priced alike)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    prices: HashMap<String, f64>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, provider: impl Into<String>, price_per_1k: f64) -> Self {
        self.set_price(provider, price_per_1k);
        self
    }

    pub fn set_price(&mut self, provider: impl Into<String>, price_per_1k: f64) {
        self.prices.insert(provider.into(), price_per_1k);
    }

    pub fn price_per_1k(&self, provider: &str) -> Result<f64, GatewayError> {
        self.prices.get(provider).copied().ok_or_else(|| {
            GatewayError::Configuration(format!("Unknown provider for billing: {}", provider))
        })
    }

    pub fn cost(&self, provider: &str, tokens_in: u32, tokens_out: u32) -> Result<f64, GatewayError> {
        let rate = self.price_per_1k(provider)?;
        let total = f64::from(tokens_in) + f64::from(tokens_out);
        Ok(total / 1000.0 * rate)
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.prices.contains_key(provider)
    }
}

/// Inclusive calendar-day range in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl UsageRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, GatewayError> {
        if from > to {
            return Err(GatewayError::bad_request("from must not be after to"));
        }
        Ok(Self { from, to })
    }

    pub fn parse(from: &str, to: &str) -> Result<Self, GatewayError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| GatewayError::bad_request("from and to must be YYYY-MM-DD dates"))
        };
        Self::new(parse(from)?, parse(to)?)
    }

    /// First instant of `from`
    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.from.and_time(NaiveTime::MIN))
    }

    /// Last representable millisecond of `to`
    pub fn end(&self) -> DateTime<Utc> {
        let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&self.to.and_time(last))
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start() && at <= self.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub sessions: u64,
    pub tokens: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUsage {
    pub provider: String,
    pub sessions: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub tokens: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUsage {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub sessions: u64,
    pub tokens: u64,
    pub cost_usd: f64,
}

/// Tenant usage rollup for a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub range: UsageRange,
    pub totals: UsageTotals,
    pub by_provider: Vec<ProviderUsage>,
    pub top_agents: Vec<AgentUsage>,
}

/// Maximum number of agents listed in `UsageSummary::top_agents`
pub const TOP_AGENTS_LIMIT: usize = 10;
