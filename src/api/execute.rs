// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::{
    hex,
    primitives::{Bytes, U256},
};
use axum::{extract::State, Json};

use super::{parse_address, parse_hex, parse_signed, parse_word};
use crate::{
    auth::Relayer,
    error::ApiError,
    models::{ExecuteRequest, ExecuteResponse},
    registry::ExecuteCall,
    state::AppState,
};

/// Forward a call on behalf of a service owner.
///
/// The callee's output is returned hex-encoded. A callee failure is a 424
/// whose `payload` field carries the callee's failure data unmodified.
#[utoipa::path(
    post,
    path = "/v1/execute",
    request_body = ExecuteRequest,
    tag = "Execute",
    security(("relayer_jwt" = [])),
    responses(
        (status = 200, body = ExecuteResponse),
        (status = 403, description = "Signer does not own the service"),
        (status = 422, description = "Unsupported operation code"),
        (status = 424, description = "Callee failed; payload attached")
    )
)]
pub async fn execute(
    State(state): State<AppState>,
    Relayer(caller): Relayer,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let signed = parse_signed(&request.signer, &request.signature)?;
    let call = ExecuteCall {
        operation: match request.operation.as_deref() {
            Some(op) => parse_word("operation", op)?,
            None => U256::ZERO,
        },
        target: parse_address("target", &request.target)?,
        value: match request.value.as_deref() {
            Some(value) => parse_word("value", value)?,
            None => U256::ZERO,
        },
        data: match request.data.as_deref() {
            Some(data) => parse_hex("data", data)?,
            None => Bytes::new(),
        },
        service_name: request.service_name,
    };
    let gas_limit = request.gas_limit.unwrap_or(state.execute_gas_limit);

    let mut registry = state.registry.write().await;
    state.ensure_writable(&registry).await?;
    let output = registry.execute(caller, &call, gas_limit, &signed)?;
    state.persist(&registry).await?;

    Ok(Json(ExecuteResponse {
        output: hex::encode_prefixed(&output),
    }))
}
