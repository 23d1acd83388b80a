//! Tag operations and the video/fragment tag links.
//!
//! Tag names are normalized (trimmed, lowercased) before storage so
//! "Rust" and "rust" resolve to the same row.

use chrono::Utc;
use rusqlite::Connection;

use clipvault_core::{Error, FragmentId, Result, TagId, VideoId};

use crate::models::Tag;

const COLS: &str = "id, name, created_at";

/// Normalize a tag name for storage and comparison.
fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Look up a tag by normalized name, creating it if absent.
pub fn get_or_create(conn: &Connection, name: &str) -> Result<Tag> {
    let name = normalize(name);
    if name.is_empty() {
        return Err(Error::Validation("tag name must not be empty".into()));
    }

    let q = format!("SELECT {COLS} FROM tags WHERE name = ?1");
    match conn.query_row(&q, [&name], Tag::from_row) {
        Ok(tag) => return Ok(tag),
        Err(rusqlite::Error::QueryReturnedNoRows) => {}
        Err(e) => return Err(Error::database(e.to_string())),
    }

    let id = TagId::new();
    let created_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO tags (id, name, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![id.to_string(), name, created_at],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Tag {
        id,
        name,
        created_at,
    })
}

/// Get a tag by ID.
pub fn get_tag(conn: &Connection, id: TagId) -> Result<Option<Tag>> {
    let q = format!("SELECT {COLS} FROM tags WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], Tag::from_row);
    match result {
        Ok(tag) => Ok(Some(tag)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all tags alphabetically.
pub fn list_tags(conn: &Connection) -> Result<Vec<Tag>> {
    let q = format!("SELECT {COLS} FROM tags ORDER BY name ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Tag::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Tags ordered by how many fragments carry them, most used first.
///
/// Tags with no fragment links are omitted entirely.
pub fn popular_tags(conn: &Connection, limit: i64) -> Result<Vec<(Tag, i64)>> {
    let q = format!(
        "SELECT t.{}, COUNT(ft.fragment_id) AS uses FROM tags t
         JOIN fragment_tags ft ON ft.tag_id = t.id
         GROUP BY t.id ORDER BY uses DESC, t.name ASC LIMIT ?1",
        COLS.replace(", ", ", t.")
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([limit], |row| Ok((Tag::from_row(row)?, row.get(3)?)))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Delete a tag by ID. Links to videos and fragments cascade.
pub fn delete_tag(conn: &Connection, id: TagId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM tags WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Replace a video's tag set with the given names.
pub fn set_video_tags(conn: &Connection, video_id: VideoId, names: &[String]) -> Result<Vec<Tag>> {
    conn.execute(
        "DELETE FROM video_tags WHERE video_id = ?1",
        [video_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let tag = get_or_create(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO video_tags (video_id, tag_id) VALUES (?1, ?2)",
            [video_id.to_string(), tag.id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        tags.push(tag);
    }
    Ok(tags)
}

/// Tags attached to a video, alphabetically.
pub fn tags_for_video(conn: &Connection, video_id: VideoId) -> Result<Vec<Tag>> {
    let q = format!(
        "SELECT t.{} FROM tags t
         JOIN video_tags vt ON vt.tag_id = t.id
         WHERE vt.video_id = ?1 ORDER BY t.name ASC",
        COLS.replace(", ", ", t.")
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([video_id.to_string()], Tag::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Replace a fragment's tag set with the given names.
pub fn set_fragment_tags(
    conn: &Connection,
    fragment_id: FragmentId,
    names: &[String],
) -> Result<Vec<Tag>> {
    conn.execute(
        "DELETE FROM fragment_tags WHERE fragment_id = ?1",
        [fragment_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let tag = get_or_create(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO fragment_tags (fragment_id, tag_id) VALUES (?1, ?2)",
            [fragment_id.to_string(), tag.id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        tags.push(tag);
    }
    Ok(tags)
}

/// Tags attached to a fragment, alphabetically.
pub fn tags_for_fragment(conn: &Connection, fragment_id: FragmentId) -> Result<Vec<Tag>> {
    let q = format!(
        "SELECT t.{} FROM tags t
         JOIN fragment_tags ft ON ft.tag_id = t.id
         WHERE ft.fragment_id = ?1 ORDER BY t.name ASC",
        COLS.replace(", ", ", t.")
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([fragment_id.to_string()], Tag::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::{fragments, videos};

    fn setup() -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    #[test]
    fn get_or_create_normalizes() {
        let conn = setup();
        let a = get_or_create(&conn, "  Rust ").unwrap();
        let b = get_or_create(&conn, "rust").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.name, "rust");
        assert_eq!(list_tags(&conn).unwrap().len(), 1);
    }

    #[test]
    fn empty_name_rejected() {
        let conn = setup();
        let err = get_or_create(&conn, "   ").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn set_video_tags_replaces() {
        let conn = setup();
        let video = videos::create_video(
            &conn, None, "a.mp4", None, "A", Some(10.0), None, 0, None, None, None,
        )
        .unwrap();

        set_video_tags(&conn, video.id, &["one".into(), "two".into()]).unwrap();
        assert_eq!(tags_for_video(&conn, video.id).unwrap().len(), 2);

        set_video_tags(&conn, video.id, &["three".into()]).unwrap();
        let current = tags_for_video(&conn, video.id).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].name, "three");
    }

    #[test]
    fn fragment_tags_round_trip() {
        let conn = setup();
        let video = videos::create_video(
            &conn, None, "a.mp4", None, "A", Some(10.0), None, 0, None, None, None,
        )
        .unwrap();
        let frag = fragments::create_pending(&conn, video.id, "clip", None, 0.0, 5.0).unwrap();

        set_fragment_tags(&conn, frag.id, &["Action".into()]).unwrap();
        let current = tags_for_fragment(&conn, frag.id).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].name, "action");
    }

    #[test]
    fn popular_tags_counts_fragment_usage() {
        let conn = setup();
        let video = videos::create_video(
            &conn, None, "a.mp4", None, "A", Some(30.0), None, 0, None, None, None,
        )
        .unwrap();
        let f1 = fragments::create_pending(&conn, video.id, "one", None, 0.0, 5.0).unwrap();
        let f2 = fragments::create_pending(&conn, video.id, "two", None, 5.0, 10.0).unwrap();

        set_fragment_tags(&conn, f1.id, &["action".into(), "rare".into()]).unwrap();
        set_fragment_tags(&conn, f2.id, &["action".into()]).unwrap();
        // Video-only tags do not count towards popularity.
        set_video_tags(&conn, video.id, &["library".into()]).unwrap();

        let popular = popular_tags(&conn, 20).unwrap();
        assert_eq!(popular.len(), 2);
        assert_eq!(popular[0].0.name, "action");
        assert_eq!(popular[0].1, 2);
        assert_eq!(popular[1].0.name, "rare");
        assert_eq!(popular[1].1, 1);

        assert_eq!(popular_tags(&conn, 1).unwrap().len(), 1);
    }

    #[test]
    fn delete_tag_removes_links() {
        let conn = setup();
        let video = videos::create_video(
            &conn, None, "a.mp4", None, "A", Some(10.0), None, 0, None, None, None,
        )
        .unwrap();
        let tags = set_video_tags(&conn, video.id, &["gone".into()]).unwrap();

        assert!(delete_tag(&conn, tags[0].id).unwrap());
        assert!(tags_for_video(&conn, video.id).unwrap().is_empty());
    }
}
