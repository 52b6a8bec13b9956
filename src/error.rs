// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::hex;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::registry::{RegistryError, ValidationError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: Option<&'static str>,
    /// Raw callee failure payload, hex-encoded in the body.
    pub payload: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code: None,
            payload: None,
        }
    }

    pub fn with_code(mut self, error_code: &'static str) -> Self {
        self.error_code = Some(error_code);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match &err {
            RegistryError::Auth(_) => StatusCode::UNAUTHORIZED,
            RegistryError::Permission(_) => StatusCode::FORBIDDEN,
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::Conflict(_) => StatusCode::CONFLICT,
            RegistryError::Validation(ValidationError::InvalidTokenId(_)) => {
                StatusCode::BAD_REQUEST
            }
            RegistryError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RegistryError::CalleeFailure(_) => StatusCode::FAILED_DEPENDENCY,
        };
        let payload = match &err {
            RegistryError::CalleeFailure(bytes) => Some(hex::encode_prefixed(bytes)),
            _ => None,
        };

        Self {
            status,
            message: err.to_string(),
            error_code: Some(err.error_code()),
            payload,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        RegistryError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code,
            payload: self.payload,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes};
    use axum::body::to_bytes;

    use crate::registry::{ConflictError, PermissionError, ServiceName};

    #[test]
    fn constructors_set_status_and_message() {
        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let internal = ApiError::internal("oops").with_code("persistence_failed");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.error_code, Some("persistence_failed"));
    }

    #[test]
    fn registry_errors_map_to_status_codes() {
        let cases: Vec<(RegistryError, StatusCode)> = vec![
            (
                PermissionError::NotRelayer(Address::ZERO).into(),
                StatusCode::FORBIDDEN,
            ),
            (
                ConflictError::AlreadyExists(ServiceName::parse("svc").unwrap()).into(),
                StatusCode::CONFLICT,
            ),
            (
                ValidationError::NameTooLong { length: 40, max: 32 }.into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ValidationError::InvalidTokenId("nope".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistryError::CalleeFailure(Bytes::new()),
                StatusCode::FAILED_DEPENDENCY,
            ),
        ];

        for (err, status) in cases {
            let code = err.error_code();
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.error_code, Some(code));
        }
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[tokio::test]
    async fn callee_failure_body_carries_payload_hex() {
        let err = RegistryError::CalleeFailure(Bytes::from_static(b"boom"));
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "callee_failure");
        assert_eq!(body["payload"], "0x626f6f6d");
    }
}
