use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::warn;

use crate::db::services::user_service;
use crate::services::auth_service;
use crate::web::models::AuthenticatedUser;
use crate::web::{AppState, error::AppError};

pub const TOKEN_COOKIE: &str = "token";

/// Reads the token from `Authorization: Bearer <token>` or
/// `Authorization: Token <token>`.
fn token_from_header(req: &Request<AxumBody>) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("Token "))
        .map(|s| s.trim().to_string())
}

pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    // Try to get token from Authorization header first, then fall back to cookie
    let token = token_from_header(&req)
        .or_else(|| jar.get(TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::Unauthorized("Authentication credentials were not provided.".to_string()))?;

    let claims = auth_service::decode_jwt(&token, &state.config.jwt_secret)?;

    let user = match user_service::get_user_by_id(&state.db_pool, claims.user_id).await {
        Ok(user) if user.is_active => user,
        Ok(_) | Err(user_service::UserServiceError::NotFound) => {
            warn!(user_id = claims.user_id, "Token refers to a missing or inactive account.");
            return Err(AppError::Unauthorized("User inactive or deleted.".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    req.extensions_mut().insert(AuthenticatedUser { id: user.id });
    Ok(next.run(req).await)
}
