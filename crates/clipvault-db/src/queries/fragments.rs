//! Fragment CRUD operations.
//!
//! A fragment row is created in a pending state (no extracted file yet)
//! and committed by [`set_output`] once the cut succeeds. Lookups are
//! scoped by video so one video's fragment IDs cannot address another's.

use chrono::Utc;
use rusqlite::Connection;

use clipvault_core::{Error, FragmentId, Result, VideoId};

use crate::models::Fragment;

const COLS: &str = "id, video_id, name, description, start_time, end_time,
    preview_path, preview_size, video_filepath, video_file_size, created_at";

/// Insert a pending fragment row. The extracted file columns stay NULL
/// until [`set_output`] commits the row.
pub fn create_pending(
    conn: &Connection,
    video_id: VideoId,
    name: &str,
    description: Option<&str>,
    start_time: f64,
    end_time: f64,
) -> Result<Fragment> {
    let id = FragmentId::new();
    let created_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO fragments (id, video_id, name, description, start_time,
            end_time, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        rusqlite::params![
            id.to_string(),
            video_id.to_string(),
            name,
            description,
            start_time,
            end_time,
            created_at,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Fragment {
        id,
        video_id,
        name: name.to_string(),
        description: description.map(String::from),
        start_time,
        end_time,
        preview_path: None,
        preview_size: None,
        video_filepath: None,
        video_file_size: None,
        created_at,
    })
}

/// Commit a pending fragment by recording its extracted file.
pub fn set_output(
    conn: &Connection,
    id: FragmentId,
    video_filepath: &str,
    video_file_size: i64,
) -> Result<()> {
    let n = conn
        .execute(
            "UPDATE fragments SET video_filepath = ?1, video_file_size = ?2 WHERE id = ?3",
            rusqlite::params![video_filepath, video_file_size, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    if n == 0 {
        return Err(Error::not_found("fragment", id));
    }
    Ok(())
}

/// Record a rendered preview image for a fragment.
pub fn set_preview(
    conn: &Connection,
    id: FragmentId,
    preview_path: &str,
    preview_size: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE fragments SET preview_path = ?1, preview_size = ?2 WHERE id = ?3",
        rusqlite::params![preview_path, preview_size, id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Get a fragment by ID, scoped to its parent video.
pub fn get_fragment(
    conn: &Connection,
    video_id: VideoId,
    id: FragmentId,
) -> Result<Option<Fragment>> {
    let q = format!("SELECT {COLS} FROM fragments WHERE id = ?1 AND video_id = ?2");
    let result = conn.query_row(
        &q,
        [id.to_string(), video_id.to_string()],
        Fragment::from_row,
    );
    match result {
        Ok(f) => Ok(Some(f)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List a video's fragments, oldest first, optionally filtered by a
/// case-insensitive name substring.
pub fn list_by_video(
    conn: &Connection,
    video_id: VideoId,
    name_filter: Option<&str>,
) -> Result<Vec<Fragment>> {
    let mut q = format!("SELECT {COLS} FROM fragments WHERE video_id = ?1");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(video_id.to_string())];

    if let Some(name) = name_filter {
        q.push_str(" AND LOWER(name) LIKE ?2");
        params.push(Box::new(format!("%{}%", name.to_lowercase())));
    }
    q.push_str(" ORDER BY created_at ASC");

    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), Fragment::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Search fragments across all videos by name or description substring.
pub fn search_fragments(conn: &Connection, text: &str) -> Result<Vec<Fragment>> {
    let pattern = format!("%{}%", text.to_lowercase());
    let q = format!(
        "SELECT {COLS} FROM fragments
         WHERE LOWER(name) LIKE ?1 OR LOWER(COALESCE(description, '')) LIKE ?1
         ORDER BY created_at DESC"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([pattern], Fragment::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Update fragment metadata. `None` fields keep their current value.
pub fn update_fragment(
    conn: &Connection,
    video_id: VideoId,
    id: FragmentId,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<Option<Fragment>> {
    let n = conn
        .execute(
            "UPDATE fragments SET
                name = COALESCE(?1, name),
                description = COALESCE(?2, description)
             WHERE id = ?3 AND video_id = ?4",
            rusqlite::params![name, description, id.to_string(), video_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if n == 0 {
        return Ok(None);
    }
    get_fragment(conn, video_id, id)
}

/// Delete a fragment row. Tag links cascade.
pub fn delete_fragment(conn: &Connection, id: FragmentId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM fragments WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Count fragments belonging to a video.
pub fn count_for_video(conn: &Connection, video_id: VideoId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM fragments WHERE video_id = ?1",
        [video_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::videos;

    fn setup() -> (
        r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>,
        VideoId,
    ) {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let video = videos::create_video(
            &conn,
            None,
            "source.mp4",
            Some("source.mp4"),
            "Source",
            Some(60.0),
            Some("source.mp4"),
            4096,
            Some("video/mp4"),
            None,
            None,
        )
        .unwrap();
        let id = video.id;
        (conn, id)
    }

    #[test]
    fn pending_then_committed() {
        let (conn, video_id) = setup();
        let frag = create_pending(&conn, video_id, "intro", None, 0.0, 10.0).unwrap();
        assert!(!frag.is_committed());

        set_output(&conn, frag.id, "fragments/fragment_x_intro.mp4", 512).unwrap();
        let found = get_fragment(&conn, video_id, frag.id).unwrap().unwrap();
        assert!(found.is_committed());
        assert_eq!(found.video_file_size, Some(512));
    }

    #[test]
    fn set_output_missing_row() {
        let (conn, _) = setup();
        let err = set_output(&conn, FragmentId::new(), "x.mp4", 1).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn get_scoped_by_video() {
        let (conn, video_id) = setup();
        let other = videos::create_video(
            &conn, None, "other.mp4", None, "Other", Some(30.0), None, 0, None, None, None,
        )
        .unwrap();
        let frag = create_pending(&conn, video_id, "intro", None, 0.0, 10.0).unwrap();

        assert!(get_fragment(&conn, video_id, frag.id).unwrap().is_some());
        assert!(get_fragment(&conn, other.id, frag.id).unwrap().is_none());
    }

    #[test]
    fn list_with_name_filter() {
        let (conn, video_id) = setup();
        create_pending(&conn, video_id, "Intro Scene", None, 0.0, 10.0).unwrap();
        create_pending(&conn, video_id, "Outro", None, 50.0, 60.0).unwrap();

        let all = list_by_video(&conn, video_id, None).unwrap();
        assert_eq!(all.len(), 2);

        let filtered = list_by_video(&conn, video_id, Some("intro")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Intro Scene");
    }

    #[test]
    fn search_matches_description() {
        let (conn, video_id) = setup();
        create_pending(&conn, video_id, "clip", Some("the good part"), 0.0, 5.0).unwrap();

        let hits = search_fragments(&conn, "GOOD").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(search_fragments(&conn, "nothing").unwrap().is_empty());
    }

    #[test]
    fn update_keeps_unset_fields() {
        let (conn, video_id) = setup();
        let frag = create_pending(&conn, video_id, "clip", Some("desc"), 0.0, 5.0).unwrap();

        let updated = update_fragment(&conn, video_id, frag.id, Some("renamed"), None)
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.description.as_deref(), Some("desc"));
    }

    #[test]
    fn delete_and_count() {
        let (conn, video_id) = setup();
        let frag = create_pending(&conn, video_id, "clip", None, 0.0, 5.0).unwrap();
        assert_eq!(count_for_video(&conn, video_id).unwrap(), 1);

        assert!(delete_fragment(&conn, frag.id).unwrap());
        assert!(!delete_fragment(&conn, frag.id).unwrap());
        assert_eq!(count_for_video(&conn, video_id).unwrap(), 0);
    }
}
