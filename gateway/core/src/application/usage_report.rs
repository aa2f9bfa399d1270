// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Usage Report Service - tenant billing rollups over a date range
//
// Totals, per-provider breakdown and the top agents by cost, all computed
// from the tenant's UsageEvents inside the range.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::agent::AgentId;
use crate::domain::billing::{AgentUsage, ProviderUsage, UsageRange, UsageSummary, UsageTotals, TOP_AGENTS_LIMIT};
use crate::domain::errors::GatewayError;
use crate::domain::events::UsageEvent;
use crate::domain::repository::{AgentRepository, UsageRepository};
use crate::domain::session::SessionId;
use crate::domain::tenant::TenantId;

const UNKNOWN_AGENT: &str = "(deleted agent)";

pub struct UsageReportService {
    usage: Arc<dyn UsageRepository>,
    agents: Arc<dyn AgentRepository>,
}

#[derive(Default)]
struct Rollup {
    sessions: HashSet<SessionId>,
    tokens_in: u64,
    tokens_out: u64,
    cost_usd: f64,
}

impl Rollup {
    fn add(&mut self, event: &UsageEvent) {
        self.sessions.insert(event.session_id);
        self.tokens_in += u64::from(event.tokens_in);
        self.tokens_out += u64::from(event.tokens_out);
        self.cost_usd += event.cost_usd;
    }

    fn tokens(&self) -> u64 {
        self.tokens_in + self.tokens_out
    }
}

impl UsageReportService {
    pub fn new(usage: Arc<dyn UsageRepository>, agents: Arc<dyn AgentRepository>) -> Self {
        Self { usage, agents }
    }

    pub async fn usage(&self, tenant_id: TenantId, range: UsageRange) -> Result<UsageSummary, GatewayError> {
        let events = self.usage.list_in_range(tenant_id, &range).await?;

        let mut totals = Rollup::default();
        let mut by_provider: HashMap<String, Rollup> = HashMap::new();
        let mut by_agent: HashMap<AgentId, Rollup> = HashMap::new();
        for event in &events {
            totals.add(event);
            by_provider.entry(event.provider.clone()).or_default().add(event);
            by_agent.entry(event.agent_id).or_default().add(event);
        }

        let mut providers: Vec<ProviderUsage> = by_provider
            .into_iter()
            .map(|(provider, r)| ProviderUsage {
                provider,
                sessions: r.sessions.len() as u64,
                tokens_in: r.tokens_in,
                tokens_out: r.tokens_out,
                tokens: r.tokens(),
                cost_usd: r.cost_usd,
            })
            .collect();
        providers.sort_by(|a, b| b.cost_usd.total_cmp(&a.cost_usd).then_with(|| a.provider.cmp(&b.provider)));

        let names: HashMap<AgentId, String> = self
            .agents
            .list_for_tenant(tenant_id)
            .await?
            .into_iter()
            .map(|a| (a.id, a.name))
            .collect();

        let mut agents: Vec<AgentUsage> = by_agent
            .into_iter()
            .map(|(agent_id, r)| AgentUsage {
                agent_id,
                agent_name: names.get(&agent_id).cloned().unwrap_or_else(|| UNKNOWN_AGENT.to_string()),
                sessions: r.sessions.len() as u64,
                tokens: r.tokens(),
                cost_usd: r.cost_usd,
            })
            .collect();
        agents.sort_by(|a, b| b.cost_usd.total_cmp(&a.cost_usd).then_with(|| a.agent_name.cmp(&b.agent_name)));
        agents.truncate(TOP_AGENTS_LIMIT);

        Ok(UsageSummary {
            range,
            totals: UsageTotals {
                sessions: totals.sessions.len() as u64,
                tokens: totals.tokens(),
                cost_usd: totals.cost_usd,
            },
            by_provider: providers,
            top_agents: agents,
        })
    }
}
