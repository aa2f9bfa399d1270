// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Gateway Error Taxonomy
//!
//! Every failure that leaves the core is a [`GatewayError`]. Each variant maps
//! to a stable machine-readable code and an HTTP-style status so the boundary
//! layer can render it without inspecting messages.
//!
//! | Variant | Codes | Status |
//! |---------|-------|--------|
//! | `Validation` | `MISSING_IDEMPOTENCY_KEY`, `BAD_REQUEST` | 400 |
//! | `BadProvider` | `BAD_PROVIDER` | 400 |
//! | `NotFound` | `TENANT_NOT_FOUND`, `SESSION_NOT_FOUND`, `AGENT_NOT_FOUND` | 404 |
//! | `Conflict` | `IDEMPOTENCY_CONFLICT` | 409 |
//! | `InProgress` | `IDEMPOTENCY_IN_PROGRESS` | 409 |
//! | `Unavailable` | `PROVIDER_UNAVAILABLE` | 502 |
//! | `Configuration` | `CONFIGURATION_ERROR` | 500 |
//! | `Repository` | `INTERNAL_ERROR` | 500 |
//!
//! Transient and terminal provider failures never cross the boundary directly;
//! they are absorbed by the fallback router and surface as `Unavailable`.

use serde::{Deserialize, Serialize};

use crate::domain::repository::RepositoryError;

/// Message substituted for every 500-class error when rendered at the boundary
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("Idempotency key reuse with different payload")]
    Conflict,

    #[error("A request with this idempotency key is still being processed")]
    InProgress,

    #[error("Unknown provider: {0}")]
    BadProvider(String),

    #[error("Provider unavailable")]
    Unavailable,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl GatewayError {
    pub fn missing_idempotency_key() -> Self {
        Self::Validation {
            code: "MISSING_IDEMPOTENCY_KEY",
            message: "Missing idempotency key".to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Validation {
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn tenant_not_found() -> Self {
        Self::NotFound {
            code: "TENANT_NOT_FOUND",
            message: "Tenant not found".to_string(),
        }
    }

    pub fn session_not_found() -> Self {
        Self::NotFound {
            code: "SESSION_NOT_FOUND",
            message: "Session not found".to_string(),
        }
    }

    pub fn agent_not_found() -> Self {
        Self::NotFound {
            code: "AGENT_NOT_FOUND",
            message: "Agent not found".to_string(),
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } | Self::NotFound { code, .. } => code,
            Self::Conflict => "IDEMPOTENCY_CONFLICT",
            Self::InProgress => "IDEMPOTENCY_IN_PROGRESS",
            Self::BadProvider(_) => "BAD_PROVIDER",
            Self::Unavailable => "PROVIDER_UNAVAILABLE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Repository(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP-style status for the boundary layer
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::BadProvider(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict | Self::InProgress => 409,
            Self::Unavailable => 502,
            Self::Configuration(_) | Self::Repository(_) => 500,
        }
    }

    /// Render the structured body that crosses the boundary.
    ///
    /// Internal details of 500-class errors are replaced by a generic message.
    pub fn to_body(&self, request_id: Option<&str>) -> ErrorBody {
        let message = if self.status() >= 500 && !matches!(self, Self::Unavailable) {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                request_id: request_id.map(str::to_string),
            },
        }
    }
}

/// Wire shape of an error response: `{ "error": { "code", "message", "requestId" } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        assert_eq!(GatewayError::missing_idempotency_key().status(), 400);
        assert_eq!(GatewayError::session_not_found().code(), "SESSION_NOT_FOUND");
        assert_eq!(GatewayError::agent_not_found().status(), 404);
        assert_eq!(GatewayError::tenant_not_found().code(), "TENANT_NOT_FOUND");
        assert_eq!(GatewayError::Conflict.status(), 409);
        assert_eq!(GatewayError::Unavailable.code(), "PROVIDER_UNAVAILABLE");
        assert_eq!(GatewayError::Unavailable.status(), 502);
        assert_eq!(GatewayError::BadProvider("vendorZ".into()).status(), 400);
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = GatewayError::Repository(RepositoryError::Database(
            "connection refused on 10.0.0.3".to_string(),
        ));
        let body = err.to_body(Some("req-1"));

        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert_eq!(body.error.message, INTERNAL_ERROR_MESSAGE);
        assert_eq!(body.error.request_id.as_deref(), Some("req-1"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["requestId"], "req-1");
    }

    #[test]
    fn test_client_errors_keep_message() {
        let body = GatewayError::Conflict.to_body(None);
        assert_eq!(body.error.code, "IDEMPOTENCY_CONFLICT");
        assert!(body.error.message.contains("different payload"));
        assert!(body.error.request_id.is_none());
    }
}
