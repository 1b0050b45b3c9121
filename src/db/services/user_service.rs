use bcrypt::verify;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set, SqlErr};
use thiserror::Error;

use crate::db::entities::{prelude::User, user};

pub const MIN_PASSWORD_LENGTH: usize = 5;
const MAX_EMAIL_LENGTH: usize = 255;
const MAX_NAME_LENGTH: usize = 255;

#[derive(Error, Debug)]
pub enum UserServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Users must have an email address.")]
    MissingEmail,
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("Ensure the password has at least {} characters.", MIN_PASSWORD_LENGTH)]
    PasswordTooShort,
    #[error("Ensure the name has no more than {} characters.", MAX_NAME_LENGTH)]
    NameTooLong,
    #[error("A user with the email '{0}' already exists.")]
    DuplicateEmail(String),
    #[error("Unable to authenticate with provided credentials.")]
    InvalidCredentials,
    #[error("User not found")]
    NotFound,
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Lowercases the domain part of an address and leaves the local part alone,
/// so `Test2@Example.COM` becomes `Test2@example.com`.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn validate_email(email: &str) -> Result<String, UserServiceError> {
    if email.trim().is_empty() {
        return Err(UserServiceError::MissingEmail);
    }

    let normalized = normalize_email(email);
    let valid = normalized.len() <= MAX_EMAIL_LENGTH
        && !normalized.contains(char::is_whitespace)
        && normalized
            .rsplit_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(UserServiceError::InvalidEmail);
    }
    Ok(normalized)
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserServiceError::PasswordTooShort);
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), UserServiceError> {
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(UserServiceError::NameTooLong);
    }
    Ok(())
}

/// Maps a unique violation on a write that set `email` to `DuplicateEmail`.
fn email_conflict(err: DbErr, email: Option<String>) -> UserServiceError {
    match (err.sql_err(), email) {
        (Some(SqlErr::UniqueConstraintViolation(_)), Some(email)) => UserServiceError::DuplicateEmail(email),
        _ => UserServiceError::DbErr(err),
    }
}

pub async fn find_by_email<C>(db: &C, email: &str) -> Result<Option<user::Model>, DbErr>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
}

pub async fn get_user_by_id<C>(db: &C, user_id: i32) -> Result<user::Model, UserServiceError>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(UserServiceError::NotFound)
}

/// Creates a regular account. The email is normalized before the uniqueness
/// check, and the password is stored as a bcrypt hash of the given cost.
pub async fn create_user<C>(
    db: &C,
    email: &str,
    password: &str,
    name: &str,
    bcrypt_cost: u32,
) -> Result<user::Model, UserServiceError>
where
    C: ConnectionTrait,
{
    let email = validate_email(email)?;
    validate_password(password)?;
    validate_name(name)?;

    if find_by_email(db, &email).await?.is_some() {
        return Err(UserServiceError::DuplicateEmail(email));
    }

    let password_hash = bcrypt::hash(password, bcrypt_cost)?;
    let now = Utc::now();

    let new_user = user::ActiveModel {
        email: Set(email.clone()),
        name: Set(name.to_string()),
        password_hash: Set(password_hash),
        is_active: Set(true),
        is_staff: Set(false),
        is_superuser: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    // A concurrent registration can still slip past the lookup above.
    new_user.insert(db).await.map_err(|e| email_conflict(e, Some(email)))
}

pub async fn create_superuser<C>(
    db: &C,
    email: &str,
    password: &str,
    name: &str,
    bcrypt_cost: u32,
) -> Result<user::Model, UserServiceError>
where
    C: ConnectionTrait,
{
    let user = create_user(db, email, password, name, bcrypt_cost).await?;

    let mut active: user::ActiveModel = user.into();
    active.is_superuser = Set(true);
    active.is_staff = Set(true);
    active.is_active = Set(true);
    active.updated_at = Set(Utc::now());

    Ok(active.update(db).await?)
}

/// Checks credentials. Unknown accounts, inactive accounts and wrong passwords
/// all come back as `InvalidCredentials`.
pub async fn authenticate<C>(db: &C, email: &str, password: &str) -> Result<user::Model, UserServiceError>
where
    C: ConnectionTrait,
{
    if email.trim().is_empty() || password.is_empty() {
        return Err(UserServiceError::InvalidCredentials);
    }

    let user = find_by_email(db, email)
        .await?
        .ok_or(UserServiceError::InvalidCredentials)?;

    if !user.is_active {
        return Err(UserServiceError::InvalidCredentials);
    }

    if !verify(password, &user.password_hash)? {
        return Err(UserServiceError::InvalidCredentials);
    }

    Ok(user)
}

pub async fn update_profile<C>(
    db: &C,
    user_id: i32,
    changes: ProfileChanges,
    bcrypt_cost: u32,
) -> Result<user::Model, UserServiceError>
where
    C: ConnectionTrait,
{
    let user = get_user_by_id(db, user_id).await?;
    let mut active: user::ActiveModel = user.clone().into();

    let mut new_email = None;
    if let Some(email) = changes.email {
        let email = validate_email(&email)?;
        if email != user.email {
            if find_by_email(db, &email).await?.is_some() {
                return Err(UserServiceError::DuplicateEmail(email));
            }
            active.email = Set(email.clone());
            new_email = Some(email);
        }
    }

    if let Some(name) = changes.name {
        validate_name(&name)?;
        active.name = Set(name);
    }

    if let Some(password) = changes.password {
        validate_password(&password)?;
        active.password_hash = Set(bcrypt::hash(&password, bcrypt_cost)?);
    }

    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(|e| email_conflict(e, new_email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::services::test_support::{TEST_BCRYPT_COST, test_db};

    #[test]
    fn test_normalize_email() {
        let pairs = [
            ("test1@EXAMPLE.com", "test1@example.com"),
            ("Test2@Example.COM", "Test2@example.com"),
            ("TEST3@EXAMPLE.COM", "TEST3@example.com"),
            ("test4@Example.com", "test4@example.com"),
        ];
        for (email, expected) in pairs {
            assert_eq!(normalize_email(email), expected);
        }
    }

    #[tokio::test]
    async fn test_create_user_with_email_successful() {
        let db = test_db().await;

        let user = create_user(&db, "test@example.com", "TestPass123", "", TEST_BCRYPT_COST)
            .await
            .unwrap();

        assert_eq!(user.email, "test@example.com");
        assert!(verify("TestPass123", &user.password_hash).unwrap());
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
    }

    #[tokio::test]
    async fn test_new_user_email_normalized() {
        let db = test_db().await;

        let user = create_user(&db, "Test2@Example.COM", "test123", "", TEST_BCRYPT_COST)
            .await
            .unwrap();

        assert_eq!(user.email, "Test2@example.com");
    }

    #[tokio::test]
    async fn test_new_user_without_email_raises_error() {
        let db = test_db().await;

        for email in ["", " "] {
            let result = create_user(&db, email, "test123", "", TEST_BCRYPT_COST).await;
            assert!(matches!(result, Err(UserServiceError::MissingEmail)));
        }

        let result = create_user(&db, "not-an-email", "test123", "", TEST_BCRYPT_COST).await;
        assert!(matches!(result, Err(UserServiceError::InvalidEmail)));
    }

    #[tokio::test]
    async fn test_create_user_rejects_short_password_and_duplicates() {
        let db = test_db().await;

        let result = create_user(&db, "test@example.com", "tes", "Test Name", TEST_BCRYPT_COST).await;
        assert!(matches!(result, Err(UserServiceError::PasswordTooShort)));
        assert!(find_by_email(&db, "test@example.com").await.unwrap().is_none());

        create_user(&db, "test@example.com", "testpass", "Test Name", TEST_BCRYPT_COST)
            .await
            .unwrap();
        let result = create_user(&db, "test@EXAMPLE.com", "testpass", "Test Name", TEST_BCRYPT_COST).await;
        assert!(matches!(result, Err(UserServiceError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_create_new_superuser() {
        let db = test_db().await;

        let user = create_superuser(&db, "test@example.com", "test123", "", TEST_BCRYPT_COST)
            .await
            .unwrap();

        assert!(user.is_superuser);
        assert!(user.is_staff);
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let db = test_db().await;
        create_user(&db, "test@example.com", "testpass", "Test Name", TEST_BCRYPT_COST)
            .await
            .unwrap();

        let user = authenticate(&db, "test@example.com", "testpass").await.unwrap();
        assert_eq!(user.name, "Test Name");

        for (email, password) in [
            ("test@example.com", "wrong"),
            ("test@example.com", ""),
            ("", "testpass"),
            ("nobody@example.com", "testpass"),
        ] {
            let result = authenticate(&db, email, password).await;
            assert!(matches!(result, Err(UserServiceError::InvalidCredentials)));
        }
    }

    #[tokio::test]
    async fn test_update_profile() {
        let db = test_db().await;
        let user = create_user(&db, "test@example.com", "testpass", "Test Name", TEST_BCRYPT_COST)
            .await
            .unwrap();
        create_user(&db, "other@example.com", "testpass", "Other", TEST_BCRYPT_COST)
            .await
            .unwrap();

        let updated = update_profile(
            &db,
            user.id,
            ProfileChanges {
                name: Some("Updated Name".to_string()),
                password: Some("newpassword".to_string()),
                ..Default::default()
            },
            TEST_BCRYPT_COST,
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Updated Name");
        assert_eq!(updated.email, "test@example.com");
        assert!(verify("newpassword", &updated.password_hash).unwrap());

        let result = update_profile(
            &db,
            user.id,
            ProfileChanges {
                email: Some("other@EXAMPLE.COM".to_string()),
                ..Default::default()
            },
            TEST_BCRYPT_COST,
        )
        .await;
        assert!(matches!(result, Err(UserServiceError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_duplicate_email() {
        let db = test_db().await;
        let user = create_user(&db, "test@example.com", "testpass", "Test Name", TEST_BCRYPT_COST)
            .await
            .unwrap();

        let mut clash: user::ActiveModel = user.into();
        clash.id = sea_orm::ActiveValue::NotSet;
        let err = clash.insert(&db).await.unwrap_err();

        assert!(matches!(
            email_conflict(err, Some("test@example.com".to_string())),
            UserServiceError::DuplicateEmail(email) if email == "test@example.com"
        ));
    }
}
