// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};

use super::parse_address;
use crate::{error::ApiError, models::NonceResponse, state::AppState};

/// Current nonce of an authorizing identity.
///
/// The next signature from this identity must be built on this value.
#[utoipa::path(
    get,
    path = "/v1/nonces/{address}",
    params(
        ("address" = String, Path, description = "Authorizing identity, 0x-prefixed hex")
    ),
    tag = "Queries",
    responses(
        (status = 200, body = NonceResponse),
        (status = 400, description = "Malformed address")
    )
)]
pub async fn get_nonce(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<NonceResponse>, ApiError> {
    let address = parse_address("address", &address)?;
    let nonce = state.registry.read().await.nonce(&address);
    Ok(Json(NonceResponse {
        address: address.to_string(),
        nonce: nonce.to_string(),
    }))
}
