// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use gateway_core::domain::gateway_config::{GatewayConfigManifest, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./mgw-config.yaml)
        #[arg(short, long, default_value = "./mgw-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = GatewayConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./mgw-config.yaml");
        println!("  4. ~/.mgw/config.yaml");
        println!("  5. /etc/mgw/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Providers:".bold());
    for provider in &config.spec.providers {
        let state = if provider.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!(
            "  {} ({:?}) {}",
            provider.name.bold(),
            provider.provider_type,
            state
        );
        println!("    Price: ${} / 1k tokens", provider.price_per_1k);
        match &provider.faults {
            Some(faults) => println!(
                "    Faults: failure {:.0}%, slow {:.0}%, latency {}-{} ms",
                faults.failure_rate * 100.0,
                faults.slow_rate * 100.0,
                faults.latency_ms.0,
                faults.latency_ms.1
            ),
            None => println!("    Faults: {}", "vendor defaults".dimmed()),
        }
    }
    println!();

    let reliability = &config.spec.reliability;
    println!("{}", "Reliability:".bold());
    println!("  Call timeout: {} ms", reliability.call_timeout_ms);
    println!("  Max attempts: {}", reliability.max_attempts);
    println!(
        "  Backoff: {} ms base, {} ms cap, {} ms jitter",
        reliability.base_delay_ms, reliability.max_delay_ms, reliability.jitter_ms
    );
    println!();

    println!("{}", "Idempotency:".bold());
    println!("  In-flight wait: {} ms", config.spec.idempotency.in_flight_wait_ms);
    println!("  Poll interval: {} ms", config.spec.idempotency.poll_interval_ms);
    println!();

    println!("{}", "Database:".bold());
    match &config.spec.database.url {
        Some(_) => println!("  PostgreSQL ({} connections)", config.spec.database.max_connections),
        None => println!("  {}", "in-memory (not configured)".dimmed()),
    }

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    if with_examples {
        std::fs::write(&output, include_str!("../../templates/mgw-config-with-examples.yaml"))
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    } else {
        GatewayConfigManifest::default()
            .to_yaml_file(&output)
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    }

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
