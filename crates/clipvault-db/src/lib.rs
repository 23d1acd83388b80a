//! clipvault-db: database access and persistence layer.
//!
//! SQLite-backed storage with connection pooling, embedded migrations,
//! typed models, and query modules for videos, fragments, and tags.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use models::{Fragment, Tag, Video};
pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
