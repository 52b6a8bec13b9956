// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relayer Authentication
//!
//! Mutating endpoints are reserved for the relayer, which proves itself with
//! a bearer token.
//!
//! ## Auth Flow
//!
//! 1. The relayer signs an HS256 JWT with the shared `RELAYER_JWT_SECRET`
//! 2. It sends `Authorization: Bearer <JWT>` with every mutating request
//! 3. The server:
//!    - verifies the HMAC and expiry (60 seconds of clock skew tolerated)
//!    - reads `sub` as the relayer's address
//!    - hands that address to the registry as the caller
//!
//! The registry itself decides whether the caller is the configured relayer
//! (`not_relayer`, 403). This module only establishes who is calling.

pub mod claims;
pub mod error;
pub mod extractor;

pub use claims::{issue_token, AuthConfig, RelayerClaims};
pub use error::AuthError;
pub use extractor::Relayer;
