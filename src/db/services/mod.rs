//! The `services` module provides the data-access layer used by the HTTP
//! handlers. Each sub-module owns one domain area and hides the SeaORM queries
//! behind plain async functions that take a connection (or a transaction).

pub mod recipe_service;
pub mod tag_service;
pub mod user_service;

pub use recipe_service::*;
pub use tag_service::*;
pub use user_service::*;
