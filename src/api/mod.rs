// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::str::FromStr;

use alloy::primitives::{Address, Bytes, U256};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    models::{
        EventResponse, ExecuteRequest, ExecuteResponse, NonceResponse, RegisterServiceRequest,
        RegisterTokenRequest, ServiceResponse, SignedRequest, TokenResponse, TokenServiceRequest,
    },
    registry::{Signed, TokenId},
    state::AppState,
};

pub mod events;
pub mod execute;
pub mod health;
pub mod nonces;
pub mod services;
pub mod tokens;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/services", post(services::register_service))
        .route("/services/{name}", get(services::get_service))
        .route(
            "/services/{name}/unregister",
            post(services::unregister_service),
        )
        .route("/tokens", post(tokens::register_token))
        .route("/tokens/{token_id}", get(tokens::get_token))
        .route(
            "/tokens/{token_id}/unregister",
            post(tokens::unregister_token),
        )
        .route("/tokens/{token_id}/use", post(tokens::use_token))
        .route("/tokens/{token_id}/unuse", post(tokens::unuse_token))
        .route("/execute", post(execute::execute))
        .route("/nonces/{address}", get(nonces::get_nonce))
        .route("/events", get(events::list_events));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        services::register_service,
        services::get_service,
        services::unregister_service,
        tokens::register_token,
        tokens::get_token,
        tokens::unregister_token,
        tokens::use_token,
        tokens::unuse_token,
        execute::execute,
        nonces::get_nonce,
        events::list_events
    ),
    components(
        schemas(
            RegisterServiceRequest,
            SignedRequest,
            RegisterTokenRequest,
            TokenServiceRequest,
            ExecuteRequest,
            ServiceResponse,
            TokenResponse,
            NonceResponse,
            ExecuteResponse,
            EventResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&RelayerSecurity),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Services", description = "Service registration"),
        (name = "Tokens", description = "Token lifecycle and service relations"),
        (name = "Execute", description = "Calls forwarded on behalf of a service owner"),
        (name = "Queries", description = "Nonces and events")
    )
)]
struct ApiDoc;

struct RelayerSecurity;

impl utoipa::Modify for RelayerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "relayer_jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

// =============================================================================
// Input parsing
// =============================================================================

fn invalid(field: &str, detail: impl std::fmt::Display) -> ApiError {
    ApiError::bad_request(format!("Invalid {field}: {detail}")).with_code("invalid_input")
}

pub(crate) fn parse_address(field: &str, value: &str) -> Result<Address, ApiError> {
    Address::from_str(value.trim()).map_err(|e| invalid(field, e))
}

pub(crate) fn parse_hex(field: &str, value: &str) -> Result<Bytes, ApiError> {
    Bytes::from_str(value.trim()).map_err(|e| invalid(field, e))
}

/// Decimal, or hex with a `0x` prefix.
pub(crate) fn parse_word(field: &str, value: &str) -> Result<U256, ApiError> {
    U256::from_str(value.trim()).map_err(|e| invalid(field, e))
}

pub(crate) fn parse_token_id(value: &str) -> Result<TokenId, ApiError> {
    Ok(TokenId::from_str(value.trim())?)
}

pub(crate) fn parse_signed(signer: &str, signature: &str) -> Result<Signed, ApiError> {
    Ok(Signed::new(
        parse_address("signer", signer)?,
        parse_hex("signature", signature)?,
    ))
}
