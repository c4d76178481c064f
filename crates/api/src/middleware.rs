use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use shopkeep_auth::JwtValidator;
use shopkeep_infra::SharedStore;

use crate::app::errors::json_error;
use crate::context::RequestPrincipal;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub store: SharedStore,
}

/// Resolve the bearer token, if any, into a [`RequestPrincipal`].
///
/// No `Authorization` header means an anonymous request. A header that does
/// not carry a valid token for an existing user is rejected with 401, even on
/// routes that allow anonymous access.
pub async fn principal_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let principal = match extract_bearer(req.headers())? {
        None => RequestPrincipal::anonymous(),
        Some(token) => {
            let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
                tracing::debug!(error = %e, "bearer token rejected");
                unauthenticated("invalid or expired token")
            })?;

            let user = state
                .store
                .find_user(claims.sub)
                .map_err(|e| {
                    tracing::error!(error = %e, "principal lookup failed");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage failure")
                })?
                .ok_or_else(|| unauthenticated("account no longer exists"))?;

            RequestPrincipal::authenticated(user.principal())
        }
    };

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, Response> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header
        .to_str()
        .map_err(|_| unauthenticated("malformed authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthenticated("expected a bearer token"))?
        .trim();
    if token.is_empty() {
        return Err(unauthenticated("empty bearer token"));
    }

    Ok(Some(token))
}

fn unauthenticated(message: &'static str) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthenticated", message)
}
