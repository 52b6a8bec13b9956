// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the relayer identity.
//!
//! ```rust,ignore
//! async fn my_handler(Relayer(caller): Relayer) -> impl IntoResponse {
//!     // caller is the Address from the token's `sub`
//! }
//! ```

use std::str::FromStr;

use alloy::primitives::Address;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, Validation};

use super::{AuthConfig, AuthError, RelayerClaims};
use crate::state::AppState;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Address claimed by a verified relayer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relayer(pub Address);

impl FromRequestParts<AppState> for Relayer {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let relayer = verify_token(token, &state.auth_config).inspect_err(|e| {
            tracing::warn!(error = %e, "relayer token rejected");
        })?;

        Ok(Relayer(relayer))
    }
}

/// Verify an HS256 relayer token and return its subject address.
pub fn verify_token(token: &str, config: &AuthConfig) -> Result<Address, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_aud = false;

    let token_data = decode::<RelayerClaims>(token, config.decoding_key(), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            _ => AuthError::MalformedToken,
        })?;

    Address::from_str(&token_data.claims.sub).map_err(|_| AuthError::InvalidSubject)
}
