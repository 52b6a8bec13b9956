// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry error taxonomy.
//!
//! Every error aborts the whole operation: no index is written and no nonce
//! is consumed. [`RegistryError::error_code`] gives the machine-readable kind.

use alloy::primitives::{Address, Bytes};

use super::types::{ServiceName, TokenId};

/// Signature verification failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid signer: signature recovers to {recovered}, expected {claimed}")]
    InvalidSigner { claimed: Address, recovered: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceName),

    #[error("Token not found: {0}")]
    TokenNotFound(TokenId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("Service already exists: {0}")]
    AlreadyExists(ServiceName),

    #[error("Token already exists: {0}")]
    TokenAlreadyExists(TokenId),

    #[error("Token {token_id} is already used by service {service}")]
    AlreadyUsed {
        token_id: TokenId,
        service: ServiceName,
    },

    #[error("Token {token_id} is not used by service {service}")]
    NotUsed {
        token_id: TokenId,
        service: ServiceName,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    #[error("Signer {signer} is not authorized for this operation")]
    Unauthorized { signer: Address },

    #[error("Caller {0} is not the relayer")]
    NotRelayer(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Service name is {length} bytes, maximum is {max}")]
    NameTooLong { length: usize, max: usize },

    #[error("Unsupported operation code: {0}")]
    UnsupportedOperation(String),

    #[error("Zero address is not a valid recipient")]
    ZeroAddress,

    #[error("Invalid token id: {0}")]
    InvalidTokenId(String),
}

/// Top-level error returned by every registry operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The forwarded call failed; the payload is the callee's own, unmodified.
    #[error("Callee failure ({} bytes)", .0.len())]
    CalleeFailure(Bytes),
}

impl RegistryError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistryError::Auth(AuthError::InvalidSignatureLength(_)) => "invalid_signature_length",
            RegistryError::Auth(AuthError::InvalidSignature) => "invalid_signature",
            RegistryError::Auth(AuthError::InvalidSigner { .. }) => "invalid_signer",
            RegistryError::NotFound(NotFoundError::ServiceNotFound(_)) => "service_not_found",
            RegistryError::NotFound(NotFoundError::TokenNotFound(_)) => "token_not_found",
            RegistryError::Conflict(ConflictError::AlreadyExists(_)) => "already_exists",
            RegistryError::Conflict(ConflictError::TokenAlreadyExists(_)) => "token_already_exists",
            RegistryError::Conflict(ConflictError::AlreadyUsed { .. }) => "already_used",
            RegistryError::Conflict(ConflictError::NotUsed { .. }) => "not_used",
            RegistryError::Permission(PermissionError::Unauthorized { .. }) => "unauthorized",
            RegistryError::Permission(PermissionError::NotRelayer(_)) => "not_relayer",
            RegistryError::Validation(ValidationError::NameTooLong { .. }) => "name_too_long",
            RegistryError::Validation(ValidationError::UnsupportedOperation(_)) => {
                "unsupported_operation"
            }
            RegistryError::Validation(ValidationError::ZeroAddress) => "zero_address",
            RegistryError::Validation(ValidationError::InvalidTokenId(_)) => "invalid_token_id",
            RegistryError::CalleeFailure(_) => "callee_failure",
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
