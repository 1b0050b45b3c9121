use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use thiserror::Error;
use tracing::debug;

use crate::db::entities::{prelude::Recipe, recipe, tag};
use crate::db::services::tag_service::{self, TagDescriptor, TagServiceError};

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_LINK_LENGTH: usize = 255;
const PRICE_DECIMAL_PLACES: u32 = 2;
const PRICE_MAX_WHOLE: i64 = 1000;

#[derive(Error, Debug)]
pub enum RecipeServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Recipe not found: {0}")]
    NotFound(i32),
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error(transparent)]
    Tag(#[from] TagServiceError),
}

impl RecipeServiceError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        RecipeServiceError::Validation {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub description: String,
    pub tags: Vec<TagDescriptor>,
}

/// Fields to change on an existing recipe. `None` leaves the stored value
/// alone; for `tags`, `Some(vec![])` clears the tag set.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<TagDescriptor>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeWithTags {
    pub recipe: recipe::Model,
    pub tags: Vec<tag::Model>,
}

fn validate_title(title: &str) -> Result<(), RecipeServiceError> {
    if title.trim().is_empty() {
        return Err(RecipeServiceError::invalid("title", "This field may not be blank."));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(RecipeServiceError::invalid(
            "title",
            format!("Ensure this field has no more than {MAX_TITLE_LENGTH} characters."),
        ));
    }
    Ok(())
}

fn validate_time_minutes(time_minutes: i32) -> Result<(), RecipeServiceError> {
    if time_minutes < 0 {
        return Err(RecipeServiceError::invalid(
            "time_minutes",
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    Ok(())
}

/// Prices are stored as `DECIMAL(5, 2)`.
fn validate_price(price: Decimal) -> Result<(), RecipeServiceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(RecipeServiceError::invalid(
            "price",
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    if price.normalize().scale() > PRICE_DECIMAL_PLACES {
        return Err(RecipeServiceError::invalid(
            "price",
            format!("Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."),
        ));
    }
    if price.trunc() >= Decimal::from(PRICE_MAX_WHOLE) {
        return Err(RecipeServiceError::invalid(
            "price",
            "Ensure that there are no more than 3 digits before the decimal point.",
        ));
    }
    Ok(())
}

fn validate_link(link: &str) -> Result<(), RecipeServiceError> {
    if link.chars().count() > MAX_LINK_LENGTH {
        return Err(RecipeServiceError::invalid(
            "link",
            format!("Ensure this field has no more than {MAX_LINK_LENGTH} characters."),
        ));
    }
    Ok(())
}

fn validate_changes(changes: &RecipeChanges) -> Result<(), RecipeServiceError> {
    if let Some(title) = &changes.title {
        validate_title(title)?;
    }
    if let Some(time_minutes) = changes.time_minutes {
        validate_time_minutes(time_minutes)?;
    }
    if let Some(price) = changes.price {
        validate_price(price)?;
    }
    if let Some(link) = &changes.link {
        validate_link(link)?;
    }
    if let Some(tags) = &changes.tags {
        for descriptor in tags {
            tag_service::validate_tag_name(&descriptor.name)?;
        }
    }
    Ok(())
}

async fn get_owned_recipe<C>(db: &C, recipe_id: i32, user_id: i32) -> Result<recipe::Model, RecipeServiceError>
where
    C: ConnectionTrait,
{
    Recipe::find_by_id(recipe_id)
        .filter(recipe::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(RecipeServiceError::NotFound(recipe_id))
}

/// Lists the user's recipes, newest first, with their tags.
pub async fn get_recipes_by_user_id(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<RecipeWithTags>, RecipeServiceError> {
    let recipes = Recipe::find()
        .filter(recipe::Column::UserId.eq(user_id))
        .order_by_desc(recipe::Column::Id)
        .all(db)
        .await?;

    let ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
    let mut tags = tag_service::get_tags_for_recipes(db, &ids).await?;

    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeWithTags {
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}

/// Fetches one recipe. Recipes owned by someone else are reported as missing.
pub async fn get_recipe_by_id(
    db: &DatabaseConnection,
    recipe_id: i32,
    user_id: i32,
) -> Result<RecipeWithTags, RecipeServiceError> {
    let recipe = get_owned_recipe(db, recipe_id, user_id).await?;
    let tags = tag_service::get_tags_for_recipe(db, recipe.id).await?;
    Ok(RecipeWithTags { recipe, tags })
}

/// Inserts the recipe and reconciles its tags in one transaction.
pub async fn create_recipe(
    db: &DatabaseConnection,
    user_id: i32,
    mut new_recipe: NewRecipe,
) -> Result<RecipeWithTags, RecipeServiceError> {
    new_recipe.title = new_recipe.title.trim().to_string();
    validate_title(&new_recipe.title)?;
    validate_time_minutes(new_recipe.time_minutes)?;
    validate_price(new_recipe.price)?;
    validate_link(&new_recipe.link)?;
    for descriptor in &new_recipe.tags {
        tag_service::validate_tag_name(&descriptor.name)?;
    }

    let txn = db.begin().await?;
    let now = Utc::now();

    let recipe = recipe::ActiveModel {
        user_id: Set(user_id),
        title: Set(new_recipe.title),
        time_minutes: Set(new_recipe.time_minutes),
        price: Set(new_recipe.price),
        link: Set(new_recipe.link),
        description: Set(new_recipe.description),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    tag_service::assign_tags(&txn, user_id, recipe.id, &new_recipe.tags).await?;
    let tags = tag_service::get_tags_for_recipe(&txn, recipe.id).await?;

    txn.commit().await?;
    debug!(recipe_id = recipe.id, user_id, tag_count = tags.len(), "Recipe created.");

    Ok(RecipeWithTags { recipe, tags })
}

/// Applies `changes` to one of the user's recipes. When `changes.tags` is
/// present the tag set is replaced, otherwise the current tags are kept.
pub async fn update_recipe(
    db: &DatabaseConnection,
    recipe_id: i32,
    user_id: i32,
    mut changes: RecipeChanges,
) -> Result<RecipeWithTags, RecipeServiceError> {
    changes.title = changes.title.map(|title| title.trim().to_string());
    validate_changes(&changes)?;

    let txn = db.begin().await?;
    let existing = get_owned_recipe(&txn, recipe_id, user_id).await?;

    let mut active: recipe::ActiveModel = existing.into();
    if let Some(title) = changes.title {
        active.title = Set(title);
    }
    if let Some(time_minutes) = changes.time_minutes {
        active.time_minutes = Set(time_minutes);
    }
    if let Some(price) = changes.price {
        active.price = Set(price);
    }
    if let Some(link) = changes.link {
        active.link = Set(link);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    active.updated_at = Set(Utc::now());
    let recipe = active.update(&txn).await?;

    if let Some(descriptors) = &changes.tags {
        tag_service::replace_tags(&txn, user_id, recipe.id, descriptors).await?;
    }
    let tags = tag_service::get_tags_for_recipe(&txn, recipe.id).await?;

    txn.commit().await?;
    debug!(recipe_id, user_id, tags_replaced = changes.tags.is_some(), "Recipe updated.");

    Ok(RecipeWithTags { recipe, tags })
}

pub async fn delete_recipe(db: &DatabaseConnection, recipe_id: i32, user_id: i32) -> Result<(), RecipeServiceError> {
    let txn = db.begin().await?;
    let recipe = get_owned_recipe(&txn, recipe_id, user_id).await?;

    tag_service::clear_recipe_tags(&txn, recipe.id).await?;
    recipe.delete(&txn).await?;

    txn.commit().await?;
    debug!(recipe_id, user_id, "Recipe deleted.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::services::test_support::{create_test_recipe, create_test_user, test_db};

    fn sample_recipe(tags: &[&str]) -> NewRecipe {
        NewRecipe {
            title: "Chocolate Cheesecake".to_string(),
            time_minutes: 30,
            price: Decimal::new(500, 2),
            link: String::new(),
            description: String::new(),
            tags: tags.iter().map(|name| TagDescriptor::new(*name)).collect(),
        }
    }

    fn tag_names(recipe: &RecipeWithTags) -> Vec<&str> {
        recipe.tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_recipe_with_new_tags() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;

        let created = create_recipe(&db, user.id, sample_recipe(&["Vegan", "Dessert"]))
            .await
            .unwrap();

        assert_eq!(created.recipe.title, "Chocolate Cheesecake");
        assert_eq!(created.recipe.price, Decimal::new(500, 2));
        assert_eq!(tag_names(&created), vec!["Dessert", "Vegan"]);
        assert!(created.tags.iter().all(|t| t.user_id == user.id));
    }

    #[tokio::test]
    async fn test_create_recipe_with_existing_tag() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;
        let existing = tag_service::find_or_create_tag(&db, user.id, "Indian").await.unwrap();

        let created = create_recipe(&db, user.id, sample_recipe(&["Indian", "Breakfast"]))
            .await
            .unwrap();

        assert_eq!(created.tags.len(), 2);
        assert!(created.tags.iter().any(|t| t.id == existing.id));
        assert_eq!(tag_service::get_tags_by_user_id(&db, user.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_title_and_tag_names_are_trimmed() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;
        let mut padded = sample_recipe(&["Vegan", " Vegan "]);
        padded.title = "  Chocolate Cheesecake ".to_string();

        let created = create_recipe(&db, user.id, padded).await.unwrap();

        assert_eq!(created.recipe.title, "Chocolate Cheesecake");
        assert_eq!(tag_names(&created), vec!["Vegan"]);

        let updated = update_recipe(
            &db,
            created.recipe.id,
            user.id,
            RecipeChanges {
                title: Some(" Cheesecake\n".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.recipe.title, "Cheesecake");
        assert_eq!(tag_service::get_tags_by_user_id(&db, user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_recipe_rejects_invalid_fields() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;

        let mut blank_title = sample_recipe(&[]);
        blank_title.title = " ".to_string();
        let mut too_precise = sample_recipe(&[]);
        too_precise.price = Decimal::new(5001, 3);
        let mut too_expensive = sample_recipe(&[]);
        too_expensive.price = Decimal::new(100000, 2);
        let mut blank_tag = sample_recipe(&[""]);
        blank_tag.title = "Soup".to_string();

        for payload in [blank_title, too_precise, too_expensive] {
            let result = create_recipe(&db, user.id, payload).await;
            assert!(matches!(result, Err(RecipeServiceError::Validation { .. })));
        }
        let result = create_recipe(&db, user.id, blank_tag).await;
        assert!(matches!(result, Err(RecipeServiceError::Tag(TagServiceError::InvalidName(_)))));

        assert!(get_recipes_by_user_id(&db, user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recipes_limited_to_user() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;
        let other = create_test_user(&db, "other@example.com").await;
        create_test_recipe(&db, other.id).await;
        let mine = create_test_recipe(&db, user.id).await;

        let recipes = get_recipes_by_user_id(&db, user.id).await.unwrap();

        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].recipe.id, mine.id);
    }

    #[tokio::test]
    async fn test_recipes_listed_newest_first() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;
        let first = create_test_recipe(&db, user.id).await;
        let second = create_test_recipe(&db, user.id).await;

        let ids: Vec<i32> = get_recipes_by_user_id(&db, user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.recipe.id)
            .collect();

        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields_and_tags() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;
        let created = create_recipe(&db, user.id, sample_recipe(&["Breakfast"])).await.unwrap();

        let updated = update_recipe(
            &db,
            created.recipe.id,
            user.id,
            RecipeChanges {
                title: Some("Chicken Tikka".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.recipe.title, "Chicken Tikka");
        assert_eq!(updated.recipe.time_minutes, created.recipe.time_minutes);
        assert_eq!(tag_names(&updated), vec!["Breakfast"]);
    }

    #[tokio::test]
    async fn test_update_replaces_tags() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;
        let created = create_recipe(&db, user.id, sample_recipe(&["Breakfast"])).await.unwrap();

        let updated = update_recipe(
            &db,
            created.recipe.id,
            user.id,
            RecipeChanges {
                tags: Some(vec![TagDescriptor::new("Lunch")]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(tag_names(&updated), vec!["Lunch"]);

        let cleared = update_recipe(
            &db,
            created.recipe.id,
            user.id,
            RecipeChanges {
                tags: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(cleared.tags.is_empty());
    }

    #[tokio::test]
    async fn test_other_users_recipe_is_not_found() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;
        let other = create_test_user(&db, "other@example.com").await;
        let recipe = create_test_recipe(&db, other.id).await;

        let result = update_recipe(
            &db,
            recipe.id,
            user.id,
            RecipeChanges {
                title: Some("Stolen".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(RecipeServiceError::NotFound(_))));

        let result = delete_recipe(&db, recipe.id, user.id).await;
        assert!(matches!(result, Err(RecipeServiceError::NotFound(_))));

        let unchanged = get_recipe_by_id(&db, recipe.id, other.id).await.unwrap();
        assert_eq!(unchanged.recipe.title, "Sample Recipe");
    }

    #[tokio::test]
    async fn test_delete_recipe() {
        let db = test_db().await;
        let user = create_test_user(&db, "test@example.com").await;
        let created = create_recipe(&db, user.id, sample_recipe(&["Vegan"])).await.unwrap();

        delete_recipe(&db, created.recipe.id, user.id).await.unwrap();

        let result = get_recipe_by_id(&db, created.recipe.id, user.id).await;
        assert!(matches!(result, Err(RecipeServiceError::NotFound(_))));
        assert_eq!(tag_service::get_tags_by_user_id(&db, user.id).await.unwrap().len(), 1);
    }
}
