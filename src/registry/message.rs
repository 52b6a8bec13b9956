// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Canonical message construction.
//!
//! Every operation signs `keccak256(nonce ‖ keccak256(payload))`, where the
//! payload is the packed, ordered concatenation of the operation's arguments:
//!
//! | Value | Encoding |
//! |-------|----------|
//! | string / bytes | raw bytes, no length prefix |
//! | address | 20 bytes |
//! | uint256, token id | 32 bytes big-endian |
//!
//! The signer then signs the canonical message under the EIP-191 text prefix
//! (`"\x19Ethereum Signed Message:\n32"`), which is what
//! `SignerSync::sign_message_sync` does on the client side.
//!
//! These builders are public so clients construct payloads with the same code
//! the registry verifies against. Dropping an argument from a payload would
//! let the relayer change it after signing.

use alloy::primitives::{eip191_hash_message, keccak256, Address, B256, U256};

use super::types::{ServiceName, TokenId};

/// Packed payload builder.
#[derive(Debug, Default, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(mut self, value: &str) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn address(mut self, value: Address) -> Self {
        self.buf.extend_from_slice(value.as_slice());
        self
    }

    pub fn word(mut self, value: U256) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes::<32>());
        self
    }

    pub fn token(mut self, value: TokenId) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    /// Packed bytes accumulated so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// `keccak256` of the packed payload.
    pub fn hash(&self) -> B256 {
        keccak256(&self.buf)
    }
}

/// Bind a payload hash to a nonce: `keccak256(nonce ‖ payload_hash)`.
pub fn canonical_message(nonce: U256, payload_hash: B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(&nonce.to_be_bytes::<32>());
    buf[32..].copy_from_slice(payload_hash.as_slice());
    keccak256(buf)
}

/// Digest actually signed: the canonical message under the EIP-191 prefix.
pub fn signing_hash(nonce: U256, payload_hash: B256) -> B256 {
    eip191_hash_message(canonical_message(nonce, payload_hash))
}

// =============================================================================
// Per-operation payloads
// =============================================================================

pub fn register_service(name: &ServiceName) -> MessageBuilder {
    MessageBuilder::new().string(name.as_str())
}

pub fn unregister_service(name: &ServiceName) -> MessageBuilder {
    MessageBuilder::new().string(name.as_str())
}

pub fn register_token(to: Address, token_id: TokenId) -> MessageBuilder {
    MessageBuilder::new().address(to).token(token_id)
}

pub fn register_token_with_service(
    to: Address,
    token_id: TokenId,
    service: &ServiceName,
) -> MessageBuilder {
    register_token(to, token_id).string(service.as_str())
}

pub fn unregister_token(token_id: TokenId) -> MessageBuilder {
    MessageBuilder::new().token(token_id)
}

pub fn use_token(token_id: TokenId, service: &ServiceName) -> MessageBuilder {
    MessageBuilder::new().token(token_id).string(service.as_str())
}

pub fn unuse_token(token_id: TokenId, service: &ServiceName) -> MessageBuilder {
    MessageBuilder::new().token(token_id).string(service.as_str())
}

pub fn execute(
    operation: U256,
    target: Address,
    value: U256,
    data: &[u8],
    service: &ServiceName,
) -> MessageBuilder {
    MessageBuilder::new()
        .word(operation)
        .address(target)
        .word(value)
        .bytes(data)
        .string(service.as_str())
}
