//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`.

use clipvault_core::{FragmentId, TagId, UserId, VideoId};
use serde::Serialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

fn parse_opt_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(v) => {
            let uuid = Uuid::parse_str(&v).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            Ok(Some(T::from(uuid)))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

/// A source video upload.
///
/// `filepath` is stored relative to the upload root for new rows; rows
/// migrated from older deployments may hold absolute paths, which the
/// path resolver passes through unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct Video {
    pub id: VideoId,
    pub owner_id: Option<UserId>,
    pub filename: String,
    pub original_filename: Option<String>,
    pub title: String,
    pub duration: Option<f64>,
    pub filepath: Option<String>,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Video {
    /// Build from a row selected as:
    /// id, owner_id, filename, original_filename, title, duration,
    /// filepath, file_size, mime_type, category, subcategory,
    /// created_at, updated_at
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            owner_id: parse_opt_id(row, 1)?,
            filename: row.get(2)?,
            original_filename: row.get(3)?,
            title: row.get(4)?,
            duration: row.get(5)?,
            filepath: row.get(6)?,
            file_size: row.get(7)?,
            mime_type: row.get(8)?,
            category: row.get(9)?,
            subcategory: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// A sub-clip cut out of a video.
///
/// `video_filepath` stays NULL while the row is pending; a committed
/// fragment always carries the extracted file path and size.
#[derive(Debug, Clone, Serialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub video_id: VideoId,
    pub name: String,
    pub description: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub preview_path: Option<String>,
    pub preview_size: Option<i64>,
    pub video_filepath: Option<String>,
    pub video_file_size: Option<i64>,
    pub created_at: String,
}

impl Fragment {
    /// Build from a row selected as:
    /// id, video_id, name, description, start_time, end_time,
    /// preview_path, preview_size, video_filepath, video_file_size,
    /// created_at
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            video_id: parse_id(row, 1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            preview_path: row.get(6)?,
            preview_size: row.get(7)?,
            video_filepath: row.get(8)?,
            video_file_size: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    /// A fragment is committed once its extracted file has been recorded.
    pub fn is_committed(&self) -> bool {
        self.video_filepath.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub created_at: String,
}

impl Tag {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}
