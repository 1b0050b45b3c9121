use axum::{
    Json, Router,
    extract::{Extension, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::db::services::user_service::{self, ProfileChanges, UserServiceError};
use crate::services::auth_service;
use crate::web::middleware::auth::TOKEN_COOKIE;
use crate::web::models::{
    AuthenticatedUser, RegisterRequest, TokenRequest, TokenResponse, UpdateProfileRequest, UserResponse,
};
use crate::web::{AppError, AppState};

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(create_user_handler))
        .route("/token", post(create_token_handler))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(get_me).patch(update_me))
}

async fn create_user_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let Json(payload) = payload?;
    let user = auth_service::register_user(&app_state.db_pool, payload, app_state.config.bcrypt_cost).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn create_token_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let Json(payload) = payload?;
    let token_response = auth_service::login_user(&app_state.db_pool, payload, &app_state.config).await?;

    let auth_cookie = Cookie::build((TOKEN_COOKIE, token_response.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    Ok((jar.add(auth_cookie), Json(token_response)))
}

async fn get_me(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::get_user_by_id(&app_state.db_pool, auth_user.id).await?;
    Ok(Json(UserResponse::from(user)))
}

async fn update_me(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let Json(payload) = payload?;
    let changes = ProfileChanges {
        email: payload.email,
        name: payload.name,
        password: payload.password,
    };

    let user = user_service::update_profile(&app_state.db_pool, auth_user.id, changes, app_state.config.bcrypt_cost)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            UserServiceError::InvalidCredentials => AppError::InvalidCredentials,
            UserServiceError::NotFound => AppError::NotFound("User not found".to_string()),
            UserServiceError::Hashing(e) => AppError::PasswordHashingError(e.to_string()),
            validation @ (UserServiceError::MissingEmail
            | UserServiceError::InvalidEmail
            | UserServiceError::PasswordTooShort
            | UserServiceError::NameTooLong
            | UserServiceError::DuplicateEmail(_)) => AppError::InvalidInput(validation.to_string()),
        }
    }
}
