//! Storage layer for groups
//!
//! SQLite persistence behind the [`GroupStore`](super::store::GroupStore) trait.

pub mod migrations;
pub mod sql_store;

pub use migrations::{migrate, rollback, CURRENT_GROUP_SCHEMA_VERSION};
pub use sql_store::GroupSqlStore;
