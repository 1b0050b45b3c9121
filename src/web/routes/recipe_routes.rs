use axum::{
    Json, Router,
    extract::{Extension, Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;

use crate::db::services::recipe_service::{self, NewRecipe, RecipeServiceError};
use crate::web::models::AuthenticatedUser;
use crate::web::models::recipe_models::{
    CreateRecipeRequest, RecipeDetailResponse, RecipeResponse, UpdateRecipeRequest,
};
use crate::web::{AppError, AppState};

pub fn create_recipe_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/{id}",
            get(get_recipe)
                .put(replace_recipe)
                .patch(partial_update_recipe)
                .delete(delete_recipe),
        )
}

async fn list_recipes(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    let recipes = recipe_service::get_recipes_by_user_id(&app_state.db_pool, user.id).await?;
    Ok(Json(recipes.into_iter().map(RecipeResponse::from).collect()))
}

async fn get_recipe(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i32>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let recipe = recipe_service::get_recipe_by_id(&app_state.db_pool, id, user.id).await?;
    Ok(Json(recipe.into()))
}

async fn create_recipe(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateRecipeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RecipeDetailResponse>), AppError> {
    let Json(payload) = payload?;
    let new_recipe = NewRecipe::try_from(payload)?;
    let recipe = recipe_service::create_recipe(&app_state.db_pool, user.id, new_recipe).await?;
    Ok((StatusCode::CREATED, Json(recipe.into())))
}

async fn replace_recipe(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateRecipeRequest>, JsonRejection>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    update_recipe(&app_state, &user, id, payload, false).await
}

async fn partial_update_recipe(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateRecipeRequest>, JsonRejection>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    update_recipe(&app_state, &user, id, payload, true).await
}

async fn update_recipe(
    app_state: &AppState,
    user: &AuthenticatedUser,
    id: i32,
    payload: Result<Json<UpdateRecipeRequest>, JsonRejection>,
    partial: bool,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let Json(payload) = payload?;
    let changes = payload.into_changes(partial)?;
    let recipe = recipe_service::update_recipe(&app_state.db_pool, id, user.id, changes).await?;
    Ok(Json(recipe.into()))
}

async fn delete_recipe(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    recipe_service::delete_recipe(&app_state.db_pool, id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

impl From<RecipeServiceError> for AppError {
    fn from(err: RecipeServiceError) -> Self {
        match err {
            RecipeServiceError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            // Someone else's recipe looks exactly like a missing one.
            RecipeServiceError::NotFound(_) => AppError::NotFound("Recipe not found.".to_string()),
            validation @ RecipeServiceError::Validation { .. } => AppError::InvalidInput(validation.to_string()),
            RecipeServiceError::Tag(e) => e.into(),
        }
    }
}
