// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Message Gateway CLI
//!
//! The `mgw` binary owns the gateway runtime for the lifetime of one command:
//! it loads the configuration manifest, opens the configured store, wires the
//! provider registry and runs a single operation against them.
//!
//! ## Commands
//!
//! - `mgw config show|validate|generate` - Configuration management
//! - `mgw db migrate` - Apply schema migrations to PostgreSQL
//! - `mgw seed` - Provision a tenant, agent and session
//! - `mgw agent update` - Change an agent's name, providers, prompt or tools
//! - `mgw send` - Run one conversational turn
//! - `mgw transcript` - Print a session and its messages
//! - `mgw usage` - Print the billing rollup for a date range
//! - `mgw demo` - Replay and fallback walkthrough against the in-memory store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use message_gateway::commands::{
    self, AgentCommand, ConfigCommand, DbCommand, DemoCommand, SeedCommand, SendCommand,
    TranscriptCommand, UsageCommand,
};

/// Multi-tenant message gateway
#[derive(Parser)]
#[command(name = "mgw")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "MGW_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MGW_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Database management
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// Create a tenant, an agent and a session
    #[command(name = "seed")]
    Seed {
        #[command(flatten)]
        command: SeedCommand,
    },

    /// Agent management
    #[command(name = "agent")]
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Send a customer message through the gateway
    #[command(name = "send")]
    Send {
        #[command(flatten)]
        command: SendCommand,
    },

    /// Show a session transcript
    #[command(name = "transcript")]
    Transcript {
        #[command(flatten)]
        command: TranscriptCommand,
    },

    /// Usage and cost rollup
    #[command(name = "usage")]
    Usage {
        #[command(flatten)]
        command: UsageCommand,
    },

    /// In-memory walkthrough with simulated vendors
    #[command(name = "demo")]
    Demo {
        #[command(flatten)]
        command: DemoCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Db { command }) => commands::db::handle_command(command, cli.config).await,
        Some(Commands::Seed { command }) => commands::seed::execute(command, cli.config).await,
        Some(Commands::Agent { command }) => commands::agent::handle_command(command, cli.config).await,
        Some(Commands::Send { command }) => commands::send::execute(command, cli.config).await,
        Some(Commands::Transcript { command }) => commands::transcript::execute(command, cli.config).await,
        Some(Commands::Usage { command }) => commands::usage::execute(command, cli.config).await,
        Some(Commands::Demo { command }) => commands::demo::execute(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
