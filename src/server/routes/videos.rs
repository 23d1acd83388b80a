//! Video route handlers: upload, metadata CRUD, search, and source
//! file deletion.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clipvault_core::paths::is_video_file;
use clipvault_core::VideoId;
use clipvault_db::queries::{tags, videos};

use crate::archive::IngestRequest;
use crate::server::context::AppContext;
use crate::server::error::AppError;

/// Video response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VideoResponse {
    pub id: String,
    pub filename: String,
    pub original_filename: Option<String>,
    pub title: String,
    pub duration: Option<f64>,
    pub filepath: Option<String>,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl VideoResponse {
    fn from_model(video: &clipvault_db::Video, tags: Vec<String>) -> Self {
        Self {
            id: video.id.to_string(),
            filename: video.filename.clone(),
            original_filename: video.original_filename.clone(),
            title: video.title.clone(),
            duration: video.duration,
            filepath: video.filepath.clone(),
            file_size: video.file_size,
            mime_type: video.mime_type.clone(),
            category: video.category.clone(),
            subcategory: video.subcategory.clone(),
            tags,
            created_at: video.created_at.clone(),
            updated_at: video.updated_at.clone(),
        }
    }
}

fn with_tags(
    conn: &clipvault_db::PooledConnection,
    video: &clipvault_db::Video,
) -> Result<VideoResponse, clipvault_core::Error> {
    let names = tags::tags_for_video(conn, video.id)?
        .into_iter()
        .map(|t| t.name)
        .collect();
    Ok(VideoResponse::from_model(video, names))
}

fn parse_video_id(id: &str) -> Result<VideoId, clipvault_core::Error> {
    id.parse()
        .map_err(|_| clipvault_core::Error::Validation("Invalid video ID".into()))
}

/// Query parameters for listing videos.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListVideosQuery {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Query parameters for searching videos.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SearchVideosQuery {
    /// Substring matched against title and original filename.
    pub q: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    /// Comma-separated tag names; all must be present.
    pub tags: Option<String>,
}

/// Request body for updating video metadata.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Query parameters for source deletion.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DeleteSourceQuery {
    #[serde(default)]
    pub force: bool,
}

/// POST /api/videos/upload
#[utoipa::path(
    post,
    path = "/api/videos/upload",
    responses(
        (status = 201, description = "Video uploaded and probed", body = VideoResponse),
        (status = 400, description = "Missing file or unsupported extension"),
        (status = 422, description = "File could not be probed")
    )
)]
pub async fn upload_video(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut title = None;
    let mut category = None;
    let mut subcategory = None;
    let mut tag_list = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| clipvault_core::Error::Validation(format!("multipart error: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let name = field
                    .file_name()
                    .unwrap_or("upload.mp4")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| clipvault_core::Error::Validation(format!("upload read error: {e}")))?;
                file = Some((name, data.to_vec()));
            }
            "title" => title = Some(read_text(field).await?),
            "category" => category = Some(read_text(field).await?),
            "subcategory" => subcategory = Some(read_text(field).await?),
            "tags" => {
                let raw = read_text(field).await?;
                tag_list = raw
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            _ => {}
        }
    }

    let (original_name, data) =
        file.ok_or_else(|| clipvault_core::Error::Validation("file field is required".into()))?;

    if !is_video_file(std::path::Path::new(&original_name)) {
        return Err(clipvault_core::Error::Validation(format!(
            "unsupported file type: {original_name}"
        ))
        .into());
    }
    if data.len() as u64 > ctx.config.storage.max_upload_bytes {
        return Err(clipvault_core::Error::Validation(format!(
            "upload exceeds maximum size of {} bytes",
            ctx.config.storage.max_upload_bytes
        ))
        .into());
    }

    // Unique stored name so concurrent uploads of the same file never clash.
    let stored_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(&original_name));
    tokio::fs::create_dir_all(&ctx.config.storage.upload_root)
        .await
        .map_err(clipvault_core::Error::from)?;
    let saved_path = ctx.config.storage.upload_root.join(&stored_name);
    // Bodies can run to hundreds of megabytes; keep the write off the
    // runtime workers.
    tokio::fs::write(&saved_path, &data)
        .await
        .map_err(clipvault_core::Error::from)?;

    let mime_type = mime_for_extension(&original_name);
    let video = ctx
        .archive
        .ingest_video(
            &saved_path,
            IngestRequest {
                title: title.unwrap_or_else(|| title_from_filename(&original_name)),
                original_filename: Some(original_name),
                mime_type,
                category,
                subcategory,
                tags: tag_list,
                owner_id: None,
            },
        )
        .await?;

    let conn = clipvault_db::get_conn(&ctx.db)?;
    let response = with_tags(&conn, &video)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/videos
#[utoipa::path(
    get,
    path = "/api/videos",
    params(ListVideosQuery),
    responses(
        (status = 200, description = "List videos, newest first", body = Vec<VideoResponse>)
    )
)]
pub async fn list_videos(
    State(ctx): State<AppContext>,
    Query(query): Query<ListVideosQuery>,
) -> Result<Json<Vec<VideoResponse>>, AppError> {
    let conn = clipvault_db::get_conn(&ctx.db)?;
    let items = videos::list_videos(
        &conn,
        query.category.as_deref(),
        query.subcategory.as_deref(),
        query.limit.clamp(1, 500),
        query.offset.max(0),
    )?;
    let responses = items
        .iter()
        .map(|v| with_tags(&conn, v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(responses))
}

/// GET /api/videos/search
#[utoipa::path(
    get,
    path = "/api/videos/search",
    params(SearchVideosQuery),
    responses(
        (status = 200, description = "Videos matching all filters", body = Vec<VideoResponse>)
    )
)]
pub async fn search_videos(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchVideosQuery>,
) -> Result<Json<Vec<VideoResponse>>, AppError> {
    let search = videos::VideoSearch {
        query: query.q,
        category: query.category,
        subcategory: query.subcategory,
        date_from: query.date_from,
        date_to: query.date_to,
        tags: query
            .tags
            .map(|raw| {
                raw.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };

    let conn = clipvault_db::get_conn(&ctx.db)?;
    let items = videos::search_videos(&conn, &search)?;
    let responses = items
        .iter()
        .map(|v| with_tags(&conn, v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(responses))
}

/// GET /api/videos/:id
#[utoipa::path(
    get,
    path = "/api/videos/{id}",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video details", body = VideoResponse),
        (status = 404, description = "Video not found")
    )
)]
pub async fn get_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    let video_id = parse_video_id(&id)?;
    let conn = clipvault_db::get_conn(&ctx.db)?;
    let video = videos::get_video(&conn, video_id)?
        .ok_or_else(|| clipvault_core::Error::not_found("video", video_id))?;
    Ok(Json(with_tags(&conn, &video)?))
}

/// PUT /api/videos/:id
#[utoipa::path(
    put,
    path = "/api/videos/{id}",
    params(("id" = String, Path, description = "Video ID")),
    request_body = UpdateVideoRequest,
    responses(
        (status = 200, description = "Updated video", body = VideoResponse),
        (status = 404, description = "Video not found")
    )
)]
pub async fn update_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateVideoRequest>,
) -> Result<Json<VideoResponse>, AppError> {
    let video_id = parse_video_id(&id)?;
    let conn = clipvault_db::get_conn(&ctx.db)?;
    let video = videos::update_video(
        &conn,
        video_id,
        payload.title.as_deref(),
        payload.category.as_deref(),
        payload.subcategory.as_deref(),
    )?
    .ok_or_else(|| clipvault_core::Error::not_found("video", video_id))?;

    if let Some(names) = payload.tags {
        tags::set_video_tags(&conn, video_id, &names)?;
    }
    Ok(Json(with_tags(&conn, &video)?))
}

/// DELETE /api/videos/:id
#[utoipa::path(
    delete,
    path = "/api/videos/{id}",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video and files deleted; warnings list skipped files"),
        (status = 404, description = "Video not found")
    )
)]
pub async fn delete_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = parse_video_id(&id)?;
    let report = ctx.archive.delete_video(video_id).await?;
    Ok(Json(report))
}

/// DELETE /api/videos/:id/source
#[utoipa::path(
    delete,
    path = "/api/videos/{id}/source",
    params(
        ("id" = String, Path, description = "Video ID"),
        DeleteSourceQuery
    ),
    responses(
        (status = 200, description = "Source file removed or already gone"),
        (status = 404, description = "Video not found"),
        (status = 409, description = "File held open by another process")
    )
)]
pub async fn delete_source(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<DeleteSourceQuery>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = parse_video_id(&id)?;
    let report = ctx.archive.delete_source(video_id, query.force).await?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| clipvault_core::Error::Validation(format!("multipart error: {e}")).into())
}

/// Keep only filesystem-safe characters from a client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn title_from_filename(name: &str) -> String {
    std::path::Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string()
}

fn mime_for_extension(name: &str) -> Option<String> {
    let ext = std::path::Path::new(name)
        .extension()?
        .to_str()?
        .to_lowercase();
    let mime = match ext.as_str() {
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "wmv" => "video/x-ms-wmv",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("my clip (1).mp4"), "my_clip__1_.mp4");
        assert_eq!(sanitize_filename("plain.mp4"), "plain.mp4");
    }

    #[test]
    fn title_falls_back_to_stem() {
        assert_eq!(title_from_filename("holiday.mp4"), "holiday");
        assert_eq!(title_from_filename("no_extension"), "no_extension");
    }

    #[test]
    fn mime_lookup() {
        assert_eq!(mime_for_extension("a.mp4").as_deref(), Some("video/mp4"));
        assert_eq!(mime_for_extension("a.MKV").as_deref(), Some("video/x-matroska"));
        assert_eq!(mime_for_extension("a.txt"), None);
    }
}
