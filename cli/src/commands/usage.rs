// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `mgw usage`: billing rollup for an inclusive UTC date range

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use gateway_core::domain::billing::{UsageRange, UsageSummary};
use gateway_core::domain::tenant::TenantId;

use crate::runtime::GatewayRuntime;

#[derive(Args)]
pub struct UsageCommand {
    /// Tenant ID
    #[arg(long)]
    tenant: String,

    /// First day (YYYY-MM-DD)
    #[arg(long)]
    from: String,

    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: String,

    /// Print the raw JSON rollup
    #[arg(long)]
    json: bool,
}

pub async fn execute(command: UsageCommand, config_path: Option<PathBuf>) -> Result<()> {
    let tenant_id = TenantId::from_string(&command.tenant).context("Invalid tenant id")?;
    let range = UsageRange::parse(&command.from, &command.to)?;

    let runtime = GatewayRuntime::connect(config_path).await?;
    let summary = runtime.reports.usage(tenant_id, range).await?;

    if command.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

pub fn print_summary(summary: &UsageSummary) {
    println!(
        "{}",
        format!("Usage {} .. {}", summary.range.from, summary.range.to).bold()
    );
    println!(
        "  Sessions: {}  Tokens: {}  Cost: ${:.6}",
        summary.totals.sessions, summary.totals.tokens, summary.totals.cost_usd
    );

    println!("{}", "By provider:".bold());
    if summary.by_provider.is_empty() {
        println!("  {}", "(no usage)".dimmed());
    }
    for row in &summary.by_provider {
        println!(
            "  {:<12} sessions {:>4}  in {:>7}  out {:>7}  ${:.6}",
            row.provider, row.sessions, row.tokens_in, row.tokens_out, row.cost_usd
        );
    }

    println!("{}", "Top agents:".bold());
    for row in &summary.top_agents {
        println!(
            "  {:<24} sessions {:>4}  tokens {:>7}  ${:.6}",
            row.agent_name, row.sessions, row.tokens, row.cost_usd
        );
    }
}
