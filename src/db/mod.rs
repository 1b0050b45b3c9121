use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

pub mod entities;
pub mod readiness;
pub mod schema;
pub mod services;

/// Opens a connection pool. SQLite in-memory URLs need `max_connections == 1`,
/// otherwise every pooled connection sees its own empty database.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .sqlx_logging(false);

    Database::connect(opt).await
}
