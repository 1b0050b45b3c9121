//! Creates the tables from the entity definitions. Every statement is
//! `IF NOT EXISTS`, so running it on each start is harmless.

use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::db::entities::{recipe, recipe_tag, tag, user};

pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Parents before children, the foreign keys need their targets.
    create_table(db, &schema, user::Entity).await?;
    create_table(db, &schema, recipe::Entity).await?;
    create_table(db, &schema, tag::Entity).await?;
    create_table(db, &schema, recipe_tag::Entity).await?;

    let unique_tag_name = Index::create()
        .name("idx_tags_user_id_name")
        .table(tag::Entity)
        .col(tag::Column::UserId)
        .col(tag::Column::Name)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&unique_tag_name)).await?;

    info!("Database schema is up to date.");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(())
}
