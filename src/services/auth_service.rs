use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::db::entities::user;
use crate::db::services::user_service;
use crate::server::config::ServerConfig;
use crate::web::error::AppError;
use crate::web::models::{Claims, RegisterRequest, TokenRequest, TokenResponse, UserResponse};

pub async fn register_user(
    pool: &DatabaseConnection,
    req: RegisterRequest,
    bcrypt_cost: u32,
) -> Result<UserResponse, AppError> {
    let user_model = user_service::create_user(pool, &req.email, &req.password, &req.name, bcrypt_cost).await?;
    info!(user_id = user_model.id, "New account registered.");
    Ok(UserResponse::from(user_model))
}

/// Checks the credentials and issues a token. Any credential problem is
/// reported as `InvalidCredentials`, without saying which part was wrong.
pub async fn login_user(
    pool: &DatabaseConnection,
    req: TokenRequest,
    config: &ServerConfig,
) -> Result<TokenResponse, AppError> {
    let user = user_service::authenticate(pool, &req.email, &req.password)
        .await
        .inspect_err(|e| warn!(error = %e, "Token request rejected."))?;

    let token = create_jwt_for_user(&user, &config.jwt_secret, config.token_ttl_hours)?;
    Ok(TokenResponse { token })
}

pub fn create_jwt_for_user(user: &user::Model, jwt_secret: &str, ttl_hours: i64) -> Result<String, AppError> {
    let expiration = (Utc::now() + Duration::hours(ttl_hours)).timestamp() as usize;

    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(jwt_secret.as_ref()))
        .map_err(|e| AppError::TokenCreationError(e.to_string()))
}

pub fn decode_jwt(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(token, &DecodingKey::from_secret(jwt_secret.as_ref()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| {
            warn!(error = ?e, "JWT decoding error.");
            AppError::Unauthorized("Invalid token.".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> user::Model {
        let now = Utc::now();
        user::Model {
            id: 7,
            email: "test@example.com".to_string(),
            name: "Test Name".to_string(),
            password_hash: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let token = create_jwt_for_user(&sample_user(), "secret", 24).unwrap();
        let claims = decode_jwt(&token, "secret").unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "test@example.com");
    }

    #[test]
    fn test_token_with_wrong_secret_rejected() {
        let token = create_jwt_for_user(&sample_user(), "secret", 24).unwrap();
        assert!(matches!(decode_jwt(&token, "other"), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_jwt_for_user(&sample_user(), "secret", -1).unwrap();
        assert!(matches!(decode_jwt(&token, "secret"), Err(AppError::Unauthorized(_))));
    }
}
