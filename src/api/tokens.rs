// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{parse_address, parse_signed, parse_token_id};
use crate::{
    auth::Relayer,
    error::ApiError,
    models::{RegisterTokenRequest, SignedRequest, TokenResponse, TokenServiceRequest},
    registry::{NotFoundError, Registry, RegistryError, TokenId},
    state::AppState,
};

fn token_view(registry: &Registry, token_id: TokenId) -> TokenResponse {
    TokenResponse::new(
        token_id,
        registry.token_owner(&token_id).map(|owner| owner.to_string()),
        registry
            .services_using(&token_id)
            .iter()
            .map(|name| name.to_string())
            .collect(),
    )
}

#[utoipa::path(
    post,
    path = "/v1/tokens",
    request_body = RegisterTokenRequest,
    tag = "Tokens",
    security(("relayer_jwt" = [])),
    responses(
        (status = 201, body = TokenResponse),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Token already exists or already used"),
        (status = 422, description = "Zero recipient or service name too long")
    )
)]
pub async fn register_token(
    State(state): State<AppState>,
    Relayer(caller): Relayer,
    Json(request): Json<RegisterTokenRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let signed = parse_signed(&request.signer, &request.signature)?;
    let to = parse_address("to", &request.to)?;
    let token_id = parse_token_id(&request.token_id)?;

    let mut registry = state.registry.write().await;
    state.ensure_writable(&registry).await?;
    match request.service_name.as_deref() {
        Some(service_name) => {
            registry.register_token_with_service(caller, to, token_id, service_name, &signed)?
        }
        None => registry.register_token(caller, to, token_id, &signed)?,
    }
    state.persist(&registry).await?;

    Ok((StatusCode::CREATED, Json(token_view(&registry, token_id))))
}

#[utoipa::path(
    get,
    path = "/v1/tokens/{token_id}",
    params(
        ("token_id" = String, Path, description = "32-byte token id, 0x-prefixed hex")
    ),
    tag = "Tokens",
    responses(
        (status = 200, body = TokenResponse),
        (status = 404, description = "Token not found")
    )
)]
pub async fn get_token(
    Path(token_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token_id = parse_token_id(&token_id)?;
    let registry = state.registry.read().await;
    let view = token_view(&registry, token_id);
    if view.owner.is_none() && view.services.is_empty() {
        return Err(RegistryError::from(NotFoundError::TokenNotFound(token_id)).into());
    }
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/v1/tokens/{token_id}/unregister",
    params(
        ("token_id" = String, Path, description = "Token to burn")
    ),
    request_body = SignedRequest,
    tag = "Tokens",
    security(("relayer_jwt" = [])),
    responses(
        (status = 204, description = "Token burned and detached from every service"),
        (status = 403, description = "Signer does not own the token"),
        (status = 404, description = "Token not found")
    )
)]
pub async fn unregister_token(
    Path(token_id): Path<String>,
    State(state): State<AppState>,
    Relayer(caller): Relayer,
    Json(request): Json<SignedRequest>,
) -> Result<StatusCode, ApiError> {
    let signed = parse_signed(&request.signer, &request.signature)?;
    let token_id = parse_token_id(&token_id)?;

    let mut registry = state.registry.write().await;
    state.ensure_writable(&registry).await?;
    registry.unregister_token(caller, token_id, &signed)?;
    state.persist(&registry).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/tokens/{token_id}/use",
    params(
        ("token_id" = String, Path, description = "Token to attach")
    ),
    request_body = TokenServiceRequest,
    tag = "Tokens",
    security(("relayer_jwt" = [])),
    responses(
        (status = 200, body = TokenResponse),
        (status = 403, description = "Signer does not own the token"),
        (status = 404, description = "Service or token not found"),
        (status = 409, description = "Token already used by the service")
    )
)]
pub async fn use_token(
    Path(token_id): Path<String>,
    State(state): State<AppState>,
    Relayer(caller): Relayer,
    Json(request): Json<TokenServiceRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let signed = parse_signed(&request.signer, &request.signature)?;
    let token_id = parse_token_id(&token_id)?;

    let mut registry = state.registry.write().await;
    state.ensure_writable(&registry).await?;
    registry.use_token(caller, token_id, &request.service_name, &signed)?;
    state.persist(&registry).await?;

    Ok(Json(token_view(&registry, token_id)))
}

#[utoipa::path(
    post,
    path = "/v1/tokens/{token_id}/unuse",
    params(
        ("token_id" = String, Path, description = "Token to detach")
    ),
    request_body = TokenServiceRequest,
    tag = "Tokens",
    security(("relayer_jwt" = [])),
    responses(
        (status = 200, body = TokenResponse),
        (status = 403, description = "Signer does not own the token"),
        (status = 404, description = "Service or token not found"),
        (status = 409, description = "Token not used by the service")
    )
)]
pub async fn unuse_token(
    Path(token_id): Path<String>,
    State(state): State<AppState>,
    Relayer(caller): Relayer,
    Json(request): Json<TokenServiceRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let signed = parse_signed(&request.signer, &request.signature)?;
    let token_id = parse_token_id(&token_id)?;

    let mut registry = state.registry.write().await;
    state.ensure_writable(&registry).await?;
    registry.unuse_token(caller, token_id, &request.service_name, &signed)?;
    state.persist(&registry).await?;

    Ok(Json(token_view(&registry, token_id)))
}
