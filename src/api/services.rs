// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::parse_signed;
use crate::{
    auth::Relayer,
    error::ApiError,
    models::{RegisterServiceRequest, ServiceResponse, SignedRequest},
    registry::{NotFoundError, RegistryError, ServiceName},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/services",
    request_body = RegisterServiceRequest,
    tag = "Services",
    security(("relayer_jwt" = [])),
    responses(
        (status = 201, body = ServiceResponse),
        (status = 401, description = "Invalid relayer token or signature"),
        (status = 403, description = "Caller is not the relayer"),
        (status = 409, description = "Service already exists"),
        (status = 422, description = "Service name too long")
    )
)]
pub async fn register_service(
    State(state): State<AppState>,
    Relayer(caller): Relayer,
    Json(request): Json<RegisterServiceRequest>,
) -> Result<(StatusCode, Json<ServiceResponse>), ApiError> {
    let signed = parse_signed(&request.signer, &request.signature)?;

    let mut registry = state.registry.write().await;
    state.ensure_writable(&registry).await?;
    registry.register_service(caller, &request.name, &signed)?;
    state.persist(&registry).await?;

    let name = ServiceName::parse(request.name)?;
    let service = registry
        .service(&name)
        .ok_or_else(|| ApiError::internal("service missing after registration"))?;
    Ok((StatusCode::CREATED, Json(ServiceResponse::new(&name, service))))
}

#[utoipa::path(
    get,
    path = "/v1/services/{name}",
    params(
        ("name" = String, Path, description = "Service name")
    ),
    tag = "Services",
    responses(
        (status = 200, body = ServiceResponse),
        (status = 404, description = "Service not found")
    )
)]
pub async fn get_service(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ServiceResponse>, ApiError> {
    let name = ServiceName::parse(name)?;
    let registry = state.registry.read().await;
    let service = registry
        .service(&name)
        .ok_or_else(|| RegistryError::from(NotFoundError::ServiceNotFound(name.clone())))?;
    Ok(Json(ServiceResponse::new(&name, service)))
}

#[utoipa::path(
    post,
    path = "/v1/services/{name}/unregister",
    params(
        ("name" = String, Path, description = "Service to delete")
    ),
    request_body = SignedRequest,
    tag = "Services",
    security(("relayer_jwt" = [])),
    responses(
        (status = 204, description = "Service deleted and detached from its tokens"),
        (status = 403, description = "Signer does not own the service"),
        (status = 404, description = "Service not found")
    )
)]
pub async fn unregister_service(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Relayer(caller): Relayer,
    Json(request): Json<SignedRequest>,
) -> Result<StatusCode, ApiError> {
    let signed = parse_signed(&request.signer, &request.signature)?;

    let mut registry = state.registry.write().await;
    state.ensure_writable(&registry).await?;
    registry.unregister_service(caller, &name, &signed)?;
    state.persist(&registry).await?;

    Ok(StatusCode::NO_CONTENT)
}
