// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Idempotency Records
//!
//! A record maps `(tenant_id, key)` to the response computed for the first
//! request that used the key. It is immutable once completed.
//!
//! Before a record completes, the key is held by an in-flight *reservation*
//! so that concurrent requests sharing a brand-new key cannot both reach a
//! billed provider call. See `IdempotencyRepository` for the storage contract.
//!
//! A reservation is a lease: it carries the holder's token and expires after
//! a TTL, so a holder that crashed or was cancelled cannot pin the key
//! forever. Only the holder's token can release it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::session::SessionId;
use crate::domain::tenant::TenantId;
use crate::domain::turn::SendMessageResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub tenant_id: TenantId,
    pub key: String,
    pub request_hash: String,
    pub response: SendMessageResponse,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an atomic insert-if-absent on `(tenant_id, key)`
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// The caller now holds the key and must either complete or release it
    Acquired,

    /// Another request holds the key and has not finished yet
    InFlight { request_hash: String },

    /// The key already maps to a completed response
    Completed(IdempotencyRecord),
}

/// Identity and lifetime of one in-flight reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationLease {
    pub token: Uuid,
    pub ttl: Duration,
}

impl ReservationLease {
    pub fn new(ttl: Duration) -> Self {
        Self {
            token: Uuid::new_v4(),
            ttl,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestFingerprint<'a> {
    session_id: &'a SessionId,
    agent_id: &'a AgentId,
    content: &'a str,
}

/// Stable hash of `(session_id, agent_id, content)`: hex SHA-256 of canonical JSON
pub fn request_hash(session_id: &SessionId, agent_id: &AgentId, content: &str) -> String {
    let fingerprint = RequestFingerprint {
        session_id,
        agent_id,
        content,
    };
    // Struct serialization cannot fail: every field is a string or uuid
    let canonical = serde_json::to_vec(&fingerprint).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}
