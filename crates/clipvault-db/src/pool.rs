//! SQLite connection pooling.
//!
//! A clipvault process owns exactly one pool. File-backed pools run in WAL
//! mode with foreign keys enforced per connection; in-memory pools exist for
//! tests and get a unique shared-cache name per call so parallel tests never
//! see each other's rows. Both paths run migrations before handing the pool
//! out, so a `DbPool` in scope always means a current schema.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use clipvault_core::{Error, Result};

use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Open (creating if necessary) a file-backed database and pool.
///
/// `pool_size` comes from `server.db_pool_size` in the application config;
/// a zero is clamped to one connection rather than rejected.
pub fn init_pool(db_path: &str, pool_size: u32) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;",
        )
    });
    build_pool(manager, pool_size)
}

/// Open a throwaway in-memory database and pool.
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT_DB: AtomicU64 = AtomicU64::new(0);

    // cache=shared keeps the database alive across the pool's connections;
    // the counter keeps separate pools on separate databases.
    let uri = format!(
        "file:clipvault_mem_{}?mode=memory&cache=shared",
        NEXT_DB.fetch_add(1, Ordering::Relaxed)
    );
    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    build_pool(manager, 2)
}

/// Common tail of pool construction: build the pool, then migrate on one
/// checked-out connection before anyone else can grab one.
fn build_pool(manager: SqliteConnectionManager, pool_size: u32) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(pool_size.max(1))
        .build(manager)
        .map_err(|e| Error::database(format!("sqlite pool construction failed: {e}")))?;

    let conn = get_conn(&pool)?;
    migrations::run_migrations(&conn)?;
    Ok(pool)
}

/// Check a connection out of the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("sqlite pool checkout failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_pool_honors_configured_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipvault.db");
        let pool = init_pool(&path.to_string_lossy(), 7).unwrap();
        assert_eq!(pool.max_size(), 7);
    }

    #[test]
    fn zero_pool_size_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipvault.db");
        let pool = init_pool(&path.to_string_lossy(), 0).unwrap();
        assert_eq!(pool.max_size(), 1);
    }

    #[test]
    fn connections_enforce_foreign_keys() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn schema_is_migrated_before_first_checkout() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='videos'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn memory_pools_are_isolated_from_each_other() {
        let a = init_memory_pool().unwrap();
        let b = init_memory_pool().unwrap();

        let conn_a = get_conn(&a).unwrap();
        conn_a
            .execute(
                "INSERT INTO tags (id, name, created_at) VALUES ('t1', 'solo', datetime('now'))",
                [],
            )
            .unwrap();

        let conn_b = get_conn(&b).unwrap();
        let count: i64 = conn_b
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
