// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Aggregates, value objects and repository contracts of the gateway.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure business types with no I/O

pub mod tenant;
pub mod agent;
pub mod session;
pub mod turn;
pub mod llm;
pub mod reliability;
pub mod events;
pub mod billing;
pub mod idempotency;
pub mod gateway_config;
pub mod repository;
pub mod errors;
