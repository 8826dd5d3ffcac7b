//! Authenticated entry point (§4.6 / §6): bearer token resolved to a
//! user-id, injected into request extensions for every downstream handler.
//! Grounded on the teacher's `users/middleware.rs::auth_middleware` shape —
//! `Authorization: Bearer <token>` extracted ahead of the route, a
//! `StatusCode` returned directly on failure rather than falling through to
//! the handler's own error mapping.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
    Extension,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use memoh_core::manager::Core;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    exp: Option<usize>,
}

pub async fn auth_middleware(
    Extension(core): Extension<Core>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(core.config.auth.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(AuthenticatedUser {
        user_id: data.claims.sub,
    });
    Ok(next.run(req).await)
}
