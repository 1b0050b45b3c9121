//! Tag storage and the find-or-create reconciliation used by recipe writes.
//!
//! Tags are always scoped to one owner. Every function that resolves or
//! attaches tags takes the owner's id and never looks at another user's tags,
//! which keeps a recipe's tag set inside its owner's account.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::entities::{
    prelude::{RecipeTag, Tag},
    recipe_tag, tag,
};

pub const MAX_TAG_NAME_LENGTH: usize = 255;

#[derive(Error, Debug)]
pub enum TagServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Invalid tag name: {0}")]
    InvalidName(String),
    #[error("Tag not found: {0}")]
    NotFound(i32),
    #[error("A tag with the name '{0}' already exists.")]
    DuplicateName(String),
}

/// A nested tag as submitted with a recipe. Only `name` is significant; any
/// other attributes in the payload are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDescriptor {
    pub name: String,
}

impl TagDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Checks a tag name after trimming surrounding whitespace.
pub fn validate_tag_name(name: &str) -> Result<(), TagServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TagServiceError::InvalidName("This field may not be blank.".to_string()));
    }
    if name.chars().count() > MAX_TAG_NAME_LENGTH {
        return Err(TagServiceError::InvalidName(format!(
            "Ensure this field has no more than {MAX_TAG_NAME_LENGTH} characters."
        )));
    }
    Ok(())
}

async fn find_tag<C>(db: &C, user_id: i32, name: &str) -> Result<Option<tag::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Tag::find()
        .filter(tag::Column::UserId.eq(user_id))
        .filter(tag::Column::Name.eq(name))
        .one(db)
        .await
}

/// Returns the user's tag called `name`, creating it if it does not exist.
/// The name is trimmed first, so `" Vegan "` and `"Vegan"` are the same tag.
/// Calling this twice with the same arguments yields the same row.
pub async fn find_or_create_tag<C>(db: &C, user_id: i32, name: &str) -> Result<tag::Model, TagServiceError>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    validate_tag_name(name)?;

    if let Some(existing) = find_tag(db, user_id, name).await? {
        return Ok(existing);
    }
    insert_tag_if_absent(db, user_id, name).await
}

/// Inserts the tag unless `(user_id, name)` already exists, then reads the
/// row back. A conflicting insert is a no-op, so an enclosing Postgres
/// transaction stays usable when another request created the tag first.
async fn insert_tag_if_absent<C>(db: &C, user_id: i32, name: &str) -> Result<tag::Model, TagServiceError>
where
    C: ConnectionTrait,
{
    let new_tag = tag::ActiveModel {
        user_id: Set(user_id),
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    Tag::insert(new_tag)
        .on_conflict(
            OnConflict::columns([tag::Column::UserId, tag::Column::Name])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    find_tag(db, user_id, name)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("tag '{name}' for user {user_id}")).into())
}

/// Resolves every descriptor to a tag owned by `user_id`. The result keeps
/// submission order and holds each tag once, even if a name was repeated.
pub async fn resolve_tags<C>(
    db: &C,
    user_id: i32,
    descriptors: &[TagDescriptor],
) -> Result<Vec<tag::Model>, TagServiceError>
where
    C: ConnectionTrait,
{
    let mut resolved: Vec<tag::Model> = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let tag = find_or_create_tag(db, user_id, &descriptor.name).await?;
        if !resolved.iter().any(|t| t.id == tag.id) {
            resolved.push(tag);
        }
    }
    Ok(resolved)
}

/// Adds `tags` to the recipe's tag set. Tags that are already attached are
/// skipped, existing attachments are never removed.
pub async fn attach_tags<C>(db: &C, recipe_id: i32, tags: &[tag::Model]) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    if tags.is_empty() {
        return Ok(());
    }

    let attached: Vec<i32> = RecipeTag::find()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.tag_id)
        .collect();

    let new_links: Vec<recipe_tag::ActiveModel> = tags
        .iter()
        .filter(|tag| !attached.contains(&tag.id))
        .map(|tag| recipe_tag::ActiveModel {
            recipe_id: Set(recipe_id),
            tag_id: Set(tag.id),
        })
        .collect();

    if new_links.is_empty() {
        return Ok(());
    }
    insert_links(db, new_links).await
}

// Links attached concurrently by another request are skipped, not errors.
async fn insert_links<C>(db: &C, links: Vec<recipe_tag::ActiveModel>) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    RecipeTag::insert_many(links)
        .on_conflict(
            OnConflict::columns([recipe_tag::Column::RecipeId, recipe_tag::Column::TagId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub async fn clear_recipe_tags<C>(db: &C, recipe_id: i32) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let result = RecipeTag::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Find-or-create every descriptor and attach the result to the recipe.
/// Used when a recipe is created.
pub async fn assign_tags<C>(
    db: &C,
    user_id: i32,
    recipe_id: i32,
    descriptors: &[TagDescriptor],
) -> Result<Vec<tag::Model>, TagServiceError>
where
    C: ConnectionTrait,
{
    let tags = resolve_tags(db, user_id, descriptors).await?;
    attach_tags(db, recipe_id, &tags).await?;
    Ok(tags)
}

/// Clears the recipe's tag set, then repopulates it from `descriptors`.
/// An empty slice leaves the recipe with no tags.
pub async fn replace_tags<C>(
    db: &C,
    user_id: i32,
    recipe_id: i32,
    descriptors: &[TagDescriptor],
) -> Result<Vec<tag::Model>, TagServiceError>
where
    C: ConnectionTrait,
{
    clear_recipe_tags(db, recipe_id).await?;
    assign_tags(db, user_id, recipe_id, descriptors).await
}

pub async fn get_tags_for_recipe<C>(db: &C, recipe_id: i32) -> Result<Vec<tag::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let mut tags: Vec<tag::Model> = RecipeTag::find()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .find_also_related(Tag)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(_, tag)| tag)
        .collect();
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tags)
}

/// Loads the tag sets of several recipes with one query.
pub async fn get_tags_for_recipes<C>(db: &C, recipe_ids: &[i32]) -> Result<HashMap<i32, Vec<tag::Model>>, DbErr>
where
    C: ConnectionTrait,
{
    let mut by_recipe: HashMap<i32, Vec<tag::Model>> = HashMap::new();
    if recipe_ids.is_empty() {
        return Ok(by_recipe);
    }

    let links = RecipeTag::find()
        .filter(recipe_tag::Column::RecipeId.is_in(recipe_ids.iter().copied()))
        .find_also_related(Tag)
        .all(db)
        .await?;

    for (link, tag) in links {
        if let Some(tag) = tag {
            by_recipe.entry(link.recipe_id).or_default().push(tag);
        }
    }
    for tags in by_recipe.values_mut() {
        tags.sort_by(|a, b| a.name.cmp(&b.name));
    }
    Ok(by_recipe)
}

pub async fn get_tags_by_user_id<C>(db: &C, user_id: i32) -> Result<Vec<tag::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Tag::find()
        .filter(tag::Column::UserId.eq(user_id))
        .order_by_asc(tag::Column::Name)
        .all(db)
        .await
}

async fn get_owned_tag<C>(db: &C, tag_id: i32, user_id: i32) -> Result<tag::Model, TagServiceError>
where
    C: ConnectionTrait,
{
    Tag::find_by_id(tag_id)
        .filter(tag::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(TagServiceError::NotFound(tag_id))
}

pub async fn rename_tag<C>(db: &C, tag_id: i32, user_id: i32, name: &str) -> Result<tag::Model, TagServiceError>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    validate_tag_name(name)?;
    let tag = get_owned_tag(db, tag_id, user_id).await?;
    if tag.name == name {
        return Ok(tag);
    }

    if find_tag(db, user_id, name).await?.is_some() {
        return Err(TagServiceError::DuplicateName(name.to_string()));
    }

    let mut active: tag::ActiveModel = tag.into();
    active.name = Set(name.to_string());
    Ok(active.update(db).await?)
}

/// Deletes the tag and detaches it from every recipe it was on.
pub async fn delete_tag<C>(db: &C, tag_id: i32, user_id: i32) -> Result<(), TagServiceError>
where
    C: ConnectionTrait,
{
    let tag = get_owned_tag(db, tag_id, user_id).await?;

    RecipeTag::delete_many()
        .filter(recipe_tag::Column::TagId.eq(tag.id))
        .exec(db)
        .await?;
    tag.delete(db).await?;
    Ok(())
}
