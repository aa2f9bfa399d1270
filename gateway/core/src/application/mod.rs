// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod reliability;
pub mod audit;
pub mod fallback;
pub mod usage_meter;
pub mod gateway;
pub mod agent_service;
pub mod session_service;
pub mod usage_report;
pub mod repository_factory;

// Re-export use cases for convenience
pub use agent_service::AgentService;
pub use gateway::{IdempotencyWait, MessageGateway, StandardMessageGateway};
pub use repository_factory::{create_repositories, GatewayRepositories};
pub use session_service::{SessionService, Transcript};
pub use usage_report::UsageReportService;
