// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Registry - Signature-Authorized Service/Token Registry
//!
//! Binds content-addressed tokens to named services. Every mutation is
//! authorized by a detached secp256k1 signature of the acting identity,
//! replay-protected by a per-identity nonce, and submitted by a single
//! trusted relayer.
//!
//! ## Modules
//!
//! - `registry` - the registry engine (signatures, nonces, relations, dispatch)
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Relayer authentication (HS256 JWT)
//! - `storage` - Embedded persistence (redb)
//! - `config` - Environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod state;
pub mod storage;
