// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API. All types derive `ToSchema` for OpenAPI documentation.
//!
//! ## Encoding
//!
//! - addresses, token ids, signatures and call data: `0x`-prefixed hex
//! - 256-bit words (nonce, value, operation code): decimal or `0x` hex strings
//!
//! Every mutating request carries `signer` (the authorizing identity) and
//! `signature` (65 bytes, `r ‖ s ‖ v`) over the operation's canonical message
//! at the signer's current nonce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::registry::{EventRecord, RegistryEvent, Service, ServiceName, TokenId};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterServiceRequest {
    /// Service name, at most 32 bytes of UTF-8.
    pub name: String,
    pub signer: String,
    pub signature: String,
}

/// Body of operations whose arguments all live in the path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignedRequest {
    pub signer: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterTokenRequest {
    /// Recipient of the new token.
    pub to: String,
    /// 32-byte content hash.
    pub token_id: String,
    /// Attach the new token to this service in the same operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    pub signer: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenServiceRequest {
    pub service_name: String,
    pub signer: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    /// ERC725X operation code; only `0` (call) is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub target: String,
    /// Native value forwarded with the call (default `0`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Call data (default empty).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub service_name: String,
    /// Overrides the configured gas limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    pub signer: String,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Maximum number of events to return (most recent last).
    pub limit: Option<usize>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServiceResponse {
    pub name: String,
    pub owner: String,
    pub token_ids: Vec<String>,
}

impl ServiceResponse {
    pub fn new(name: &ServiceName, service: &Service) -> Self {
        use crate::registry::ownership::OwnedResource;

        Self {
            name: name.to_string(),
            owner: service.owner().to_string(),
            token_ids: service.token_ids().iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token_id: String,
    /// Current owner, absent if the token does not exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Services using the token.
    pub services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NonceResponse {
    pub address: String,
    /// Decimal nonce to sign the next operation with.
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExecuteResponse {
    /// Callee output, hex-encoded.
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    pub event_id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Event kind, e.g. `service_registered`.
    pub kind: String,
    /// Event fields.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl From<&EventRecord> for EventResponse {
    fn from(record: &EventRecord) -> Self {
        let data = match &record.event {
            RegistryEvent::ServiceRegistered { name, owner }
            | RegistryEvent::ServiceUnregistered { name, owner } => serde_json::json!({
                "name": name.to_string(),
                "owner": owner.to_string(),
            }),
            RegistryEvent::TokenUsed {
                token_id,
                service_name,
            }
            | RegistryEvent::TokenUnused {
                token_id,
                service_name,
            } => serde_json::json!({
                "token_id": token_id.to_string(),
                "service_name": service_name.to_string(),
            }),
            RegistryEvent::TokenMinted { token_id, to } => serde_json::json!({
                "token_id": token_id.to_string(),
                "to": to.to_string(),
            }),
            RegistryEvent::TokenBurned { token_id, owner } => serde_json::json!({
                "token_id": token_id.to_string(),
                "owner": owner.to_string(),
            }),
            RegistryEvent::Executed {
                service_name,
                target,
                value,
            } => serde_json::json!({
                "service_name": service_name.to_string(),
                "target": target.to_string(),
                "value": value.to_string(),
            }),
        };

        Self {
            event_id: record.event_id,
            sequence: record.sequence,
            timestamp: record.timestamp,
            kind: record.event.kind().to_string(),
            data,
        }
    }
}

impl TokenResponse {
    pub fn new(token_id: TokenId, owner: Option<String>, services: Vec<String>) -> Self {
        Self {
            token_id: token_id.to_string(),
            owner,
            services,
        }
    }
}
