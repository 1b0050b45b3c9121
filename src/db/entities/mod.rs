//! SeaORM entities for the recipe backend.
//!
//! One module per table. `recipe_tags` is the join table behind the
//! recipe/tag many-to-many relation.

pub mod recipe;
pub mod recipe_tag;
pub mod tag;
pub mod user;

pub mod prelude {
    pub use super::user::Entity as User;
    pub use super::recipe::Entity as Recipe;
    pub use super::tag::Entity as Tag;
    pub use super::recipe_tag::Entity as RecipeTag;
}
