// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the `mgw` CLI

pub mod agent;
pub mod config;
pub mod db;
pub mod demo;
pub mod seed;
pub mod send;
pub mod transcript;
pub mod usage;

pub use self::agent::AgentCommand;
pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::demo::DemoCommand;
pub use self::seed::SeedCommand;
pub use self::send::SendCommand;
pub use self::transcript::TranscriptCommand;
pub use self::usage::UsageCommand;
