use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use shopkeep_auth::DenyReason;
use shopkeep_core::{DomainError, FieldError};

use crate::app::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Denied(reason) => json_error(deny_status(&reason), reason.code(), reason.to_string()),
        ServiceError::Domain(DomainError::Validation(details)) => validation_error(&details),
        ServiceError::Domain(DomainError::InvalidId(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_id", msg)
        }
        ServiceError::Domain(DomainError::NotFound) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "not found")
        }
        ServiceError::Domain(DomainError::Conflict(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "conflict", msg)
        }
        ServiceError::NotFound(entity) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{entity} not found"))
        }
        e @ ServiceError::Duplicate { .. } => json_error(StatusCode::BAD_REQUEST, "duplicate", e.to_string()),
        e @ ServiceError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", e.to_string())
        }
        e @ ServiceError::InvalidOldPassword => {
            json_error(StatusCode::BAD_REQUEST, "invalid_old_password", e.to_string())
        }
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage failure")
        }
        ServiceError::Internal(msg) => {
            tracing::error!(error = %msg, "internal failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        service_error_to_response(self)
    }
}

pub fn deny_status(reason: &DenyReason) -> StatusCode {
    match reason {
        DenyReason::Unauthenticated => StatusCode::UNAUTHORIZED,
        DenyReason::InactiveAccount | DenyReason::Forbidden => StatusCode::FORBIDDEN,
        DenyReason::InvalidReference
        | DenyReason::InvalidRole
        | DenyReason::Conflict { .. }
        | DenyReason::SelfActionForbidden => StatusCode::BAD_REQUEST,
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn validation_error(details: &[FieldError]) -> Response {
    let message = details
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "error": "validation_error",
            "message": message,
            "details": details,
        })),
    )
        .into_response()
}

/// Parse a path id, answering `400 invalid_id` on failure.
pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

/// Unwrap a JSON body, answering `400 invalid_body` when it does not parse.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(v)| v).map_err(body_rejection)
}

pub fn body_rejection(rejection: JsonRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}
