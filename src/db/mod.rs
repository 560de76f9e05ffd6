/// Store module for projdex
///
/// Handles all persistence using SQLite and sqlx.
/// Implements connection pooling for performance.

pub mod connection;
pub mod models;
pub mod queries;

pub use connection::{Database, StoreStats};
pub use models::*;
