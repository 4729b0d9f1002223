//! `db` crate: pure persistence layer.
//!
//! Provides a SQLite connection pool, typed row structs, and repository
//! functions over a single key-value table of serialized workflow blobs.
//! No business logic lives here.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;

pub use pool::DbPool;
pub use error::DbError;
