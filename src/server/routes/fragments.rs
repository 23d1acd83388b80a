//! Fragment route handlers. Creation and deletion delegate to the
//! archive manager; reads go straight to the query layer.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use clipvault_core::{FragmentId, VideoId};
use clipvault_db::queries::{fragments, tags};

use crate::archive::CreateFragmentRequest;
use crate::server::context::AppContext;
use crate::server::error::AppError;

/// Fragment response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FragmentResponse {
    pub id: String,
    pub video_id: String,
    pub name: String,
    pub description: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub video_filepath: Option<String>,
    pub video_file_size: Option<i64>,
    pub preview_path: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
}

impl FragmentResponse {
    fn from_model(frag: &clipvault_db::Fragment, tags: Vec<String>) -> Self {
        Self {
            id: frag.id.to_string(),
            video_id: frag.video_id.to_string(),
            name: frag.name.clone(),
            description: frag.description.clone(),
            start_time: frag.start_time,
            end_time: frag.end_time,
            video_filepath: frag.video_filepath.clone(),
            video_file_size: frag.video_file_size,
            preview_path: frag.preview_path.clone(),
            tags,
            created_at: frag.created_at.clone(),
        }
    }
}

fn with_tags(
    conn: &clipvault_db::PooledConnection,
    frag: &clipvault_db::Fragment,
) -> Result<FragmentResponse, clipvault_core::Error> {
    let names = tags::tags_for_fragment(conn, frag.id)?
        .into_iter()
        .map(|t| t.name)
        .collect();
    Ok(FragmentResponse::from_model(frag, names))
}

fn parse_video_id(id: &str) -> Result<VideoId, clipvault_core::Error> {
    id.parse()
        .map_err(|_| clipvault_core::Error::Validation("Invalid video ID".into()))
}

fn parse_fragment_id(id: &str) -> Result<FragmentId, clipvault_core::Error> {
    id.parse()
        .map_err(|_| clipvault_core::Error::Validation("Invalid fragment ID".into()))
}

/// Request body for creating a fragment.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateFragmentBody {
    pub name: String,
    pub description: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for updating fragment metadata.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateFragmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Query parameters for listing a video's fragments.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListFragmentsQuery {
    /// Case-insensitive name substring filter.
    pub name: Option<String>,
}

/// Query parameters for the global fragment search.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SearchFragmentsQuery {
    pub q: String,
}

/// POST /api/videos/:video_id/fragments
#[utoipa::path(
    post,
    path = "/api/videos/{video_id}/fragments",
    params(("video_id" = String, Path, description = "Video ID")),
    request_body = CreateFragmentBody,
    responses(
        (status = 201, description = "Fragment extracted and committed", body = FragmentResponse),
        (status = 400, description = "Invalid range or missing source"),
        (status = 404, description = "Video not found"),
        (status = 500, description = "Extraction failed; nothing was persisted")
    )
)]
pub async fn create_fragment(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    Json(payload): Json<CreateFragmentBody>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let fragment = ctx
        .archive
        .create_fragment(
            video_id,
            CreateFragmentRequest {
                name: payload.name,
                description: payload.description,
                start_time: payload.start_time,
                end_time: payload.end_time,
                tags: payload.tags,
            },
        )
        .await?;

    let conn = clipvault_db::get_conn(&ctx.db)?;
    let response = with_tags(&conn, &fragment)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/videos/:video_id/fragments
#[utoipa::path(
    get,
    path = "/api/videos/{video_id}/fragments",
    params(
        ("video_id" = String, Path, description = "Video ID"),
        ListFragmentsQuery
    ),
    responses(
        (status = 200, description = "Fragments of the video, oldest first", body = Vec<FragmentResponse>)
    )
)]
pub async fn list_fragments(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    Query(query): Query<ListFragmentsQuery>,
) -> Result<Json<Vec<FragmentResponse>>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let conn = clipvault_db::get_conn(&ctx.db)?;
    let items = fragments::list_by_video(&conn, video_id, query.name.as_deref())?;
    let responses = items
        .iter()
        .map(|f| with_tags(&conn, f))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(responses))
}

/// GET /api/fragments/search
#[utoipa::path(
    get,
    path = "/api/fragments/search",
    params(SearchFragmentsQuery),
    responses(
        (status = 200, description = "Fragments across all videos matching name or description", body = Vec<FragmentResponse>)
    )
)]
pub async fn search_fragments(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchFragmentsQuery>,
) -> Result<Json<Vec<FragmentResponse>>, AppError> {
    let conn = clipvault_db::get_conn(&ctx.db)?;
    let items = fragments::search_fragments(&conn, &query.q)?;
    let responses = items
        .iter()
        .map(|f| with_tags(&conn, f))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(responses))
}

/// GET /api/videos/:video_id/fragments/:id
#[utoipa::path(
    get,
    path = "/api/videos/{video_id}/fragments/{id}",
    params(
        ("video_id" = String, Path, description = "Video ID"),
        ("id" = String, Path, description = "Fragment ID")
    ),
    responses(
        (status = 200, description = "Fragment details", body = FragmentResponse),
        (status = 404, description = "Fragment not found in this video")
    )
)]
pub async fn get_fragment(
    State(ctx): State<AppContext>,
    Path((video_id, id)): Path<(String, String)>,
) -> Result<Json<FragmentResponse>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let fragment_id = parse_fragment_id(&id)?;

    let conn = clipvault_db::get_conn(&ctx.db)?;
    let fragment = fragments::get_fragment(&conn, video_id, fragment_id)?
        .ok_or_else(|| clipvault_core::Error::not_found("fragment", fragment_id))?;
    Ok(Json(with_tags(&conn, &fragment)?))
}

/// PUT /api/videos/:video_id/fragments/:id
#[utoipa::path(
    put,
    path = "/api/videos/{video_id}/fragments/{id}",
    params(
        ("video_id" = String, Path, description = "Video ID"),
        ("id" = String, Path, description = "Fragment ID")
    ),
    request_body = UpdateFragmentRequest,
    responses(
        (status = 200, description = "Updated fragment", body = FragmentResponse),
        (status = 404, description = "Fragment not found in this video")
    )
)]
pub async fn update_fragment(
    State(ctx): State<AppContext>,
    Path((video_id, id)): Path<(String, String)>,
    Json(payload): Json<UpdateFragmentRequest>,
) -> Result<Json<FragmentResponse>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let fragment_id = parse_fragment_id(&id)?;

    let conn = clipvault_db::get_conn(&ctx.db)?;
    let fragment = fragments::update_fragment(
        &conn,
        video_id,
        fragment_id,
        payload.name.as_deref(),
        payload.description.as_deref(),
    )?
    .ok_or_else(|| clipvault_core::Error::not_found("fragment", fragment_id))?;

    if let Some(names) = payload.tags {
        tags::set_fragment_tags(&conn, fragment_id, &names)?;
    }
    Ok(Json(with_tags(&conn, &fragment)?))
}

/// DELETE /api/videos/:video_id/fragments/:id
#[utoipa::path(
    delete,
    path = "/api/videos/{video_id}/fragments/{id}",
    params(
        ("video_id" = String, Path, description = "Video ID"),
        ("id" = String, Path, description = "Fragment ID")
    ),
    responses(
        (status = 200, description = "Fragment deleted; warnings list skipped files"),
        (status = 404, description = "Fragment not found in this video")
    )
)]
pub async fn delete_fragment(
    State(ctx): State<AppContext>,
    Path((video_id, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let fragment_id = parse_fragment_id(&id)?;
    let report = ctx.archive.delete_fragment(video_id, fragment_id).await?;
    Ok(Json(report))
}
