#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tower::ServiceExt;

use recipe_backend::db::entities::user;
use recipe_backend::db::services::{NewRecipe, RecipeWithTags, TagDescriptor, recipe_service, user_service};
use recipe_backend::db::{connect, schema::create_tables};
use recipe_backend::server::config::{PartialServerConfig, ServerConfig};
use recipe_backend::services::auth_service;
use recipe_backend::web::create_axum_router;

pub const TEST_BCRYPT_COST: u32 = 4;
pub const TEST_PASSWORD: &str = "testpass";

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub config: Arc<ServerConfig>,
}

pub fn test_config() -> ServerConfig {
    let file = PartialServerConfig::from_toml_str(
        r#"
        database_url = "sqlite::memory:"
        jwt_secret = "test-secret"
        bcrypt_cost = 4
        "#,
    )
    .unwrap();
    ServerConfig::merge(PartialServerConfig::default(), file).unwrap()
}

pub async fn spawn_app() -> TestApp {
    let db = connect("sqlite::memory:", 1).await.unwrap();
    create_tables(&db).await.unwrap();
    let config = Arc::new(test_config());
    let router = create_axum_router(db.clone(), config.clone());
    TestApp { router, db, config }
}

impl TestApp {
    pub async fn create_user(&self, email: &str) -> user::Model {
        user_service::create_user(&self.db, email, TEST_PASSWORD, "Test Name", TEST_BCRYPT_COST)
            .await
            .unwrap()
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        auth_service::create_jwt_for_user(user, &self.config.jwt_secret, self.config.token_ttl_hours).unwrap()
    }

    /// Creates a user and returns it with a valid token.
    pub async fn login(&self, email: &str) -> (user::Model, String) {
        let user = self.create_user(email).await;
        let token = self.token_for(&user);
        (user, token)
    }

    pub async fn create_recipe(&self, user: &user::Model, tags: &[&str]) -> RecipeWithTags {
        let new_recipe = NewRecipe {
            title: "Sample Recipe".to_string(),
            time_minutes: 10,
            price: Decimal::new(500, 2),
            link: "https://www.sample.com".to_string(),
            description: "Sample Recipe Description".to_string(),
            tags: tags.iter().map(|name| TagDescriptor::new(*name)).collect(),
        };
        recipe_service::create_recipe(&self.db, user.id, new_recipe).await.unwrap()
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }
}

pub fn detail_url(recipe_id: i32) -> String {
    format!("/recipe/recipes/{recipe_id}")
}

pub fn tag_names(body: &Value) -> Vec<String> {
    let mut names: Vec<String> = body["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}
