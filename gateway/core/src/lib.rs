// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Gateway Core
//!
//! Multi-tenant message gateway: routes a conversation turn to an upstream
//! model provider with timeout, retry and one-hop fallback, and records the
//! transcript, an audit trail, billed usage and idempotent replays.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, use cases and infrastructure adapters of the gateway

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
