//! Application context shared by all request handlers.

use std::sync::Arc;

use clipvault_av::ToolRegistry;
use clipvault_core::Config;
use clipvault_db::DbPool;

use crate::archive::ArchiveManager;

/// Application context shared by all request handlers (via Axum state).
///
/// Cheaply cloneable because it only holds `Arc`s and a pool handle.
#[derive(Clone)]
pub struct AppContext {
    /// Database connection pool.
    pub db: DbPool,
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Row/file lifecycle orchestrator.
    pub archive: Arc<ArchiveManager>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
}
