//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;

use clipvault_core::{Error, Result};

/// V1: initial schema -- videos, fragments, tags and their join tables.
const V1_INITIAL: &str = r#"
-- Source video uploads
CREATE TABLE videos (
    id                TEXT PRIMARY KEY,
    owner_id          TEXT,
    filename          TEXT UNIQUE NOT NULL,
    original_filename TEXT,
    title             TEXT NOT NULL,
    duration          REAL,
    filepath          TEXT,
    file_size         INTEGER NOT NULL DEFAULT 0,
    mime_type         TEXT,
    category          TEXT,
    subcategory       TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

-- Sub-clips derived from a video
CREATE TABLE fragments (
    id              TEXT PRIMARY KEY,
    video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    description     TEXT,
    start_time      REAL NOT NULL,
    end_time        REAL NOT NULL,
    preview_path    TEXT,
    preview_size    INTEGER,
    video_filepath  TEXT,
    video_file_size INTEGER,
    created_at      TEXT NOT NULL
);

-- Tags, many-to-many with both videos and fragments
CREATE TABLE tags (
    id         TEXT PRIMARY KEY,
    name       TEXT UNIQUE NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE video_tags (
    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    tag_id   TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (video_id, tag_id)
);

CREATE TABLE fragment_tags (
    fragment_id TEXT NOT NULL REFERENCES fragments(id) ON DELETE CASCADE,
    tag_id      TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (fragment_id, tag_id)
);

-- Indexes
CREATE INDEX idx_fragments_video   ON fragments(video_id);
CREATE INDEX idx_fragments_created ON fragments(created_at);
CREATE INDEX idx_videos_category   ON videos(category);
CREATE INDEX idx_videos_created    ON videos(created_at);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}
