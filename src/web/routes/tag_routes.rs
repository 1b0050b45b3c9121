use axum::{
    Json, Router,
    extract::{Extension, Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, patch},
};
use std::sync::Arc;

use crate::db::services::tag_service::{self, TagServiceError};
use crate::web::models::AuthenticatedUser;
use crate::web::models::recipe_models::{TagResponse, UpdateTagRequest};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn get_user_tags_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    let tags = tag_service::get_tags_by_user_id(&app_state.db_pool, authenticated_user.id).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

async fn update_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<i32>,
    payload: Result<Json<UpdateTagRequest>, JsonRejection>,
) -> Result<Json<TagResponse>, AppError> {
    let Json(payload) = payload?;
    let tag = tag_service::rename_tag(&app_state.db_pool, tag_id, authenticated_user.id, &payload.name).await?;
    Ok(Json(TagResponse::from(tag)))
}

async fn delete_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    tag_service::delete_tag(&app_state.db_pool, tag_id, authenticated_user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tags", get(get_user_tags_handler))
        .route("/tags/{tag_id}", patch(update_tag_handler).delete(delete_tag_handler))
}

impl From<TagServiceError> for AppError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            TagServiceError::InvalidName(msg) => AppError::InvalidInput(format!("name: {msg}")),
            TagServiceError::NotFound(_) => AppError::NotFound("Tag not found.".to_string()),
            TagServiceError::DuplicateName(name) => {
                AppError::InvalidInput(format!("A tag with the name '{name}' already exists."))
            }
        }
    }
}
