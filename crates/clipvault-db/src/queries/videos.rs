//! Video CRUD and search operations.

use chrono::Utc;
use rusqlite::Connection;

use clipvault_core::{Error, Result, UserId, VideoId};

use crate::models::Video;

const COLS: &str = "id, owner_id, filename, original_filename, title, duration,
    filepath, file_size, mime_type, category, subcategory, created_at, updated_at";

/// Same column list qualified with the `v` alias, for joined queries.
const COLS_V: &str = "v.id, v.owner_id, v.filename, v.original_filename, v.title, v.duration,
    v.filepath, v.file_size, v.mime_type, v.category, v.subcategory, v.created_at, v.updated_at";

/// Filters for [`search_videos`]. All fields are optional and combine
/// with AND.
#[derive(Debug, Clone, Default)]
pub struct VideoSearch {
    /// Case-insensitive substring match against title and original filename.
    pub query: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Inclusive lower bound on created_at (RFC 3339).
    pub date_from: Option<String>,
    /// Inclusive upper bound on created_at (RFC 3339).
    pub date_to: Option<String>,
    /// Tag names; a video must carry every listed tag.
    pub tags: Vec<String>,
}

/// Create a new video record.
#[allow(clippy::too_many_arguments)]
pub fn create_video(
    conn: &Connection,
    owner_id: Option<UserId>,
    filename: &str,
    original_filename: Option<&str>,
    title: &str,
    duration: Option<f64>,
    filepath: Option<&str>,
    file_size: i64,
    mime_type: Option<&str>,
    category: Option<&str>,
    subcategory: Option<&str>,
) -> Result<Video> {
    let id = VideoId::new();
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO videos (id, owner_id, filename, original_filename, title,
            duration, filepath, file_size, mime_type, category, subcategory,
            created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
        rusqlite::params![
            id.to_string(),
            owner_id.map(|u| u.to_string()),
            filename,
            original_filename,
            title,
            duration,
            filepath,
            file_size,
            mime_type,
            category,
            subcategory,
            now,
            now,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Video {
        id,
        owner_id,
        filename: filename.to_string(),
        original_filename: original_filename.map(String::from),
        title: title.to_string(),
        duration,
        filepath: filepath.map(String::from),
        file_size,
        mime_type: mime_type.map(String::from),
        category: category.map(String::from),
        subcategory: subcategory.map(String::from),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Get a video by ID.
pub fn get_video(conn: &Connection, id: VideoId) -> Result<Option<Video>> {
    let q = format!("SELECT {COLS} FROM videos WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], Video::from_row);
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List videos, newest first, with optional category filters.
pub fn list_videos(
    conn: &Connection,
    category: Option<&str>,
    subcategory: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Video>> {
    let mut q = format!("SELECT {COLS} FROM videos WHERE 1=1");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(cat) = category {
        q.push_str(&format!(" AND category = ?{}", params.len() + 1));
        params.push(Box::new(cat.to_string()));
    }
    if let Some(sub) = subcategory {
        q.push_str(&format!(" AND subcategory = ?{}", params.len() + 1));
        params.push(Box::new(sub.to_string()));
    }

    q.push_str(&format!(
        " ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
        params.len() + 1,
        params.len() + 2
    ));
    params.push(Box::new(limit));
    params.push(Box::new(offset));

    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), Video::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Update mutable video metadata. `None` fields keep their current value.
pub fn update_video(
    conn: &Connection,
    id: VideoId,
    title: Option<&str>,
    category: Option<&str>,
    subcategory: Option<&str>,
) -> Result<Option<Video>> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE videos SET
                title = COALESCE(?1, title),
                category = COALESCE(?2, category),
                subcategory = COALESCE(?3, subcategory),
                updated_at = ?4
             WHERE id = ?5",
            rusqlite::params![title, category, subcategory, now, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if n == 0 {
        return Ok(None);
    }
    get_video(conn, id)
}

/// Record that a video's source file is gone: NULL the path and zero the
/// size while leaving the rest of the record intact.
pub fn clear_source(conn: &Connection, id: VideoId) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE videos SET filepath = NULL, file_size = 0, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete a video by ID. Fragment rows and tag links cascade.
pub fn delete_video(conn: &Connection, id: VideoId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM videos WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Search videos by combined metadata filters, newest first.
pub fn search_videos(conn: &Connection, search: &VideoSearch) -> Result<Vec<Video>> {
    let mut q = format!("SELECT DISTINCT {COLS_V} FROM videos v");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if !search.tags.is_empty() {
        q.push_str(
            " JOIN video_tags vt ON vt.video_id = v.id
              JOIN tags t ON t.id = vt.tag_id",
        );
    }

    q.push_str(" WHERE 1=1");

    if let Some(text) = &search.query {
        let pattern = format!("%{}%", text.to_lowercase());
        q.push_str(&format!(
            " AND (LOWER(v.title) LIKE ?{n} OR LOWER(COALESCE(v.original_filename, '')) LIKE ?{n})",
            n = params.len() + 1
        ));
        params.push(Box::new(pattern));
    }
    if let Some(cat) = &search.category {
        q.push_str(&format!(" AND v.category = ?{}", params.len() + 1));
        params.push(Box::new(cat.clone()));
    }
    if let Some(sub) = &search.subcategory {
        q.push_str(&format!(" AND v.subcategory = ?{}", params.len() + 1));
        params.push(Box::new(sub.clone()));
    }
    if let Some(from) = &search.date_from {
        q.push_str(&format!(" AND v.created_at >= ?{}", params.len() + 1));
        params.push(Box::new(from.clone()));
    }
    if let Some(to) = &search.date_to {
        q.push_str(&format!(" AND v.created_at <= ?{}", params.len() + 1));
        params.push(Box::new(to.clone()));
    }
    if !search.tags.is_empty() {
        let placeholders: Vec<String> = search
            .tags
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", params.len() + 1 + i))
            .collect();
        q.push_str(&format!(
            " AND LOWER(t.name) IN ({})",
            placeholders.join(", ")
        ));
        for tag in &search.tags {
            params.push(Box::new(tag.trim().to_lowercase()));
        }
        q.push_str(&format!(
            " GROUP BY v.id HAVING COUNT(DISTINCT t.name) = {}",
            search.tags.len()
        ));
    }

    q.push_str(" ORDER BY v.created_at DESC");

    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), Video::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Count total videos.
pub fn count_videos(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::tags;

    fn setup() -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    fn insert(conn: &Connection, filename: &str, title: &str, category: Option<&str>) -> Video {
        create_video(
            conn,
            None,
            filename,
            Some(filename),
            title,
            Some(120.0),
            Some(filename),
            2048,
            Some("video/mp4"),
            category,
            None,
        )
        .unwrap()
    }

    #[test]
    fn create_and_get() {
        let conn = setup();
        let v = insert(&conn, "a.mp4", "Alpha", Some("demos"));
        let found = get_video(&conn, v.id).unwrap().unwrap();
        assert_eq!(found.title, "Alpha");
        assert_eq!(found.file_size, 2048);
    }

    #[test]
    fn get_missing_returns_none() {
        let conn = setup();
        assert!(get_video(&conn, VideoId::new()).unwrap().is_none());
    }

    #[test]
    fn list_with_category_filter() {
        let conn = setup();
        insert(&conn, "a.mp4", "Alpha", Some("demos"));
        insert(&conn, "b.mp4", "Beta", Some("talks"));

        let all = list_videos(&conn, None, None, 50, 0).unwrap();
        assert_eq!(all.len(), 2);

        let demos = list_videos(&conn, Some("demos"), None, 50, 0).unwrap();
        assert_eq!(demos.len(), 1);
        assert_eq!(demos[0].title, "Alpha");
    }

    #[test]
    fn update_keeps_unset_fields() {
        let conn = setup();
        let v = insert(&conn, "a.mp4", "Alpha", Some("demos"));
        let updated = update_video(&conn, v.id, Some("Renamed"), None, None)
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.category.as_deref(), Some("demos"));
    }

    #[test]
    fn update_missing_returns_none() {
        let conn = setup();
        assert!(update_video(&conn, VideoId::new(), Some("x"), None, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn clear_source_nulls_path_and_size() {
        let conn = setup();
        let v = insert(&conn, "a.mp4", "Alpha", None);
        assert!(clear_source(&conn, v.id).unwrap());

        let found = get_video(&conn, v.id).unwrap().unwrap();
        assert!(found.filepath.is_none());
        assert_eq!(found.file_size, 0);
        assert_eq!(found.title, "Alpha");
    }

    #[test]
    fn delete_video_row() {
        let conn = setup();
        let v = insert(&conn, "a.mp4", "Alpha", None);
        assert!(delete_video(&conn, v.id).unwrap());
        assert!(!delete_video(&conn, v.id).unwrap());
    }

    #[test]
    fn search_by_text_matches_title_and_filename() {
        let conn = setup();
        insert(&conn, "vacation.mp4", "Summer Trip", None);
        insert(&conn, "meeting.mp4", "Standup", None);

        let by_title = search_videos(
            &conn,
            &VideoSearch {
                query: Some("summer".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_title.len(), 1);

        let by_filename = search_videos(
            &conn,
            &VideoSearch {
                query: Some("MEETING".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_filename.len(), 1);
        assert_eq!(by_filename[0].title, "Standup");
    }

    #[test]
    fn search_by_tags_requires_all() {
        let conn = setup();
        let a = insert(&conn, "a.mp4", "Alpha", None);
        let b = insert(&conn, "b.mp4", "Beta", None);

        tags::set_video_tags(&conn, a.id, &["rust".into(), "demo".into()]).unwrap();
        tags::set_video_tags(&conn, b.id, &["rust".into()]).unwrap();

        let both = search_videos(
            &conn,
            &VideoSearch {
                tags: vec!["rust".into(), "demo".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].title, "Alpha");

        let one = search_videos(
            &conn,
            &VideoSearch {
                tags: vec!["rust".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(one.len(), 2);
    }

    #[test]
    fn search_by_date_window() {
        let conn = setup();
        insert(&conn, "a.mp4", "Alpha", None);

        let hit = search_videos(
            &conn,
            &VideoSearch {
                date_from: Some("2000-01-01T00:00:00Z".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(hit.len(), 1);

        let miss = search_videos(
            &conn,
            &VideoSearch {
                date_to: Some("2000-01-01T00:00:00Z".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(miss.is_empty());
    }

    #[test]
    fn duplicate_filename_rejected() {
        let conn = setup();
        insert(&conn, "a.mp4", "Alpha", None);
        let err = create_video(
            &conn, None, "a.mp4", None, "Dup", None, None, 0, None, None, None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Database { .. }));
    }
}
