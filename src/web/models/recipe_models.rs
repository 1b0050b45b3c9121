use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::entities::tag;
use crate::db::services::{NewRecipe, RecipeChanges, RecipeWithTags, TagDescriptor};
use crate::web::error::AppError;

const OWNER_FIELD_ERROR: &str = "user: The owner of a recipe cannot be set or changed.";

/// Keeps an explicit `null` (`Some(None)`) apart from a missing key (`None`).
/// Use together with `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn not_null<T>(field: &str, value: Option<Option<T>>) -> Result<Option<T>, AppError> {
    match value {
        Some(None) => Err(AppError::InvalidInput(format!("{field}: This field may not be null."))),
        Some(value) => Ok(value),
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<TagDescriptor>,
    /// Any `user` key is rejected, `null` included.
    #[serde(default, deserialize_with = "present")]
    pub user: Option<Option<serde_json::Value>>,
}

impl TryFrom<CreateRecipeRequest> for NewRecipe {
    type Error = AppError;

    fn try_from(req: CreateRecipeRequest) -> Result<Self, Self::Error> {
        if req.user.is_some() {
            return Err(AppError::InvalidInput(OWNER_FIELD_ERROR.to_string()));
        }
        Ok(NewRecipe {
            title: req.title,
            time_minutes: req.time_minutes,
            price: req.price,
            link: req.link,
            description: req.description,
            tags: req.tags,
        })
    }
}

/// Body of both PUT and PATCH. A missing `tags` key keeps the current tags,
/// while `"tags": []` removes them all. An explicit `null` is rejected for
/// every field.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecipeRequest {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub time_minutes: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    pub price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "present")]
    pub link: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub tags: Option<Option<Vec<TagDescriptor>>>,
    #[serde(default, deserialize_with = "present")]
    pub user: Option<Option<serde_json::Value>>,
}

impl UpdateRecipeRequest {
    /// Converts the body into service changes. A full update (PUT) must carry
    /// every required field.
    pub fn into_changes(self, partial: bool) -> Result<RecipeChanges, AppError> {
        if self.user.is_some() {
            return Err(AppError::InvalidInput(OWNER_FIELD_ERROR.to_string()));
        }

        let changes = RecipeChanges {
            title: not_null("title", self.title)?,
            time_minutes: not_null("time_minutes", self.time_minutes)?,
            price: not_null("price", self.price)?,
            link: not_null("link", self.link)?,
            description: not_null("description", self.description)?,
            tags: not_null("tags", self.tags)?,
        };

        if !partial {
            let missing: Vec<&str> = [
                ("title", changes.title.is_none()),
                ("time_minutes", changes.time_minutes.is_none()),
                ("price", changes.price.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect();
            if !missing.is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "This field is required: {}",
                    missing.join(", ")
                )));
            }
        }

        Ok(changes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
}

impl From<tag::Model> for TagResponse {
    fn from(tag: tag::Model) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: String,
}

/// List representation of a recipe.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: i32,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<TagResponse>,
}

/// Detail representation: the list fields plus the description.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeDetailResponse {
    #[serde(flatten)]
    pub recipe: RecipeResponse,
    pub description: String,
}

fn display_price(mut price: Decimal) -> Decimal {
    price.rescale(2);
    price
}

impl From<RecipeWithTags> for RecipeResponse {
    fn from(value: RecipeWithTags) -> Self {
        let RecipeWithTags { recipe, tags } = value;
        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: display_price(recipe.price),
            link: recipe.link,
            tags: tags.into_iter().map(TagResponse::from).collect(),
        }
    }
}

impl From<RecipeWithTags> for RecipeDetailResponse {
    fn from(mut value: RecipeWithTags) -> Self {
        let description = std::mem::take(&mut value.recipe.description);
        Self {
            recipe: RecipeResponse::from(value),
            description,
        }
    }
}
