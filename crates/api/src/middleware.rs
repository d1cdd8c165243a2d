use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use gasline_auth::{JwtValidator, Principal};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub services: Arc<AppServices>,
}

/// Verify the bearer token and attach a [`PrincipalContext`] to the request.
///
/// The role comes from the users read model, not the token, so a removed user
/// is locked out even while their token is still unexpired.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.services.jwt().validate(token, Utc::now())?;
    if state.services.revocations().is_revoked(&claims.jti) {
        return Err(ApiError::unauthorized("token has been revoked"));
    }

    let user = state
        .services
        .read_models()
        .users
        .get(&claims.sub)
        .ok_or_else(|| ApiError::unauthorized("user no longer exists"))?;

    req.extensions_mut().insert(PrincipalContext::new(
        Principal::new(user.id, user.username, user.role),
        claims.jti,
        claims.expires_at,
    ));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || ApiError::unauthorized("missing bearer token");

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(missing)?;

    let header = header.to_str().map_err(|_| missing())?;

    let token = header.strip_prefix("Bearer ").ok_or_else(missing)?.trim();
    if token.is_empty() {
        return Err(missing());
    }

    Ok(token)
}
