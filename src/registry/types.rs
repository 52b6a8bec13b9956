// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identifier types shared by the registry components.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{B256, U256};

use super::error::ValidationError;

/// Maximum encoded length of a service name, in bytes.
pub const MAX_SERVICE_NAME_BYTES: usize = 32;

/// A token identifier: the 32-byte content hash of the registered asset.
///
/// The ownership ledger addresses the same asset by the big-endian numeric
/// reading of these bytes (see [`TokenId::as_u256`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(pub B256);

impl TokenId {
    /// Numeric reinterpretation used as the ledger asset id.
    pub fn as_u256(&self) -> U256 {
        U256::from_be_bytes(self.0 .0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }
}

impl From<B256> for TokenId {
    fn from(value: B256) -> Self {
        TokenId(value)
    }
}

impl From<[u8; 32]> for TokenId {
    fn from(value: [u8; 32]) -> Self {
        TokenId(B256::from(value))
    }
}

impl FromStr for TokenId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s)
            .map(TokenId)
            .map_err(|e| ValidationError::InvalidTokenId(e.to_string()))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A service name, at most [`MAX_SERVICE_NAME_BYTES`] bytes of UTF-8.
///
/// Comparison is exact byte equality: no case folding, no normalization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    /// Validate and wrap a service name.
    pub fn parse(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.len() > MAX_SERVICE_NAME_BYTES {
            return Err(ValidationError::NameTooLong {
                length: name.len(),
                max: MAX_SERVICE_NAME_BYTES,
            });
        }
        Ok(ServiceName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operation codes accepted by `execute`, numbered as in ERC725X.
///
/// Only [`Operation::Call`] is dispatched; every other code is rejected
/// before the callee is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Plain call in the callee's own context.
    Call,
    /// Contract creation.
    Create,
    /// Contract creation with a salt.
    Create2,
    /// Read-only call.
    StaticCall,
    /// Call in the registry's context.
    DelegateCall,
}

impl Operation {
    pub fn code(&self) -> u8 {
        match self {
            Operation::Call => 0,
            Operation::Create => 1,
            Operation::Create2 => 2,
            Operation::StaticCall => 3,
            Operation::DelegateCall => 4,
        }
    }

    /// Decode an operation code. Unknown codes yield `None`.
    pub fn from_code(code: U256) -> Option<Operation> {
        if code > U256::from(u8::MAX) {
            return None;
        }
        match code.to::<u8>() {
            0 => Some(Operation::Call),
            1 => Some(Operation::Create),
            2 => Some(Operation::Create2),
            3 => Some(Operation::StaticCall),
            4 => Some(Operation::DelegateCall),
            _ => None,
        }
    }
}
