//! Tag route handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use clipvault_core::TagId;
use clipvault_db::queries::tags;

use crate::server::context::AppContext;
use crate::server::error::AppError;

/// Tag response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TagResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl TagResponse {
    fn from_model(tag: &clipvault_db::Tag) -> Self {
        Self {
            id: tag.id.to_string(),
            name: tag.name.clone(),
            created_at: tag.created_at.clone(),
        }
    }
}

/// Tag with its fragment usage count.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PopularTagResponse {
    pub id: String,
    pub name: String,
    pub count: i64,
}

/// Request body for creating a tag.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateTagRequest {
    pub name: String,
}

/// Query parameters for the popular tags listing.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PopularTagsQuery {
    #[serde(default = "default_popular_limit")]
    pub limit: i64,
}

fn default_popular_limit() -> i64 {
    20
}

fn parse_tag_id(id: &str) -> Result<TagId, clipvault_core::Error> {
    id.parse()
        .map_err(|_| clipvault_core::Error::Validation("Invalid tag ID".into()))
}

/// GET /api/tags
#[utoipa::path(
    get,
    path = "/api/tags",
    responses(
        (status = 200, description = "All tags, alphabetically", body = Vec<TagResponse>)
    )
)]
pub async fn list_tags(
    State(ctx): State<AppContext>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    let conn = clipvault_db::get_conn(&ctx.db)?;
    let items = tags::list_tags(&conn)?;
    Ok(Json(items.iter().map(TagResponse::from_model).collect()))
}

/// POST /api/tags
#[utoipa::path(
    post,
    path = "/api/tags",
    request_body = CreateTagRequest,
    responses(
        (status = 201, description = "Tag created or already existing", body = TagResponse),
        (status = 400, description = "Empty tag name")
    )
)]
pub async fn create_tag(
    State(ctx): State<AppContext>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<impl IntoResponse, AppError> {
    let conn = clipvault_db::get_conn(&ctx.db)?;
    let tag = tags::get_or_create(&conn, &payload.name)?;
    Ok((StatusCode::CREATED, Json(TagResponse::from_model(&tag))))
}

/// GET /api/tags/popular
#[utoipa::path(
    get,
    path = "/api/tags/popular",
    params(PopularTagsQuery),
    responses(
        (status = 200, description = "Tags by fragment usage, most used first", body = Vec<PopularTagResponse>)
    )
)]
pub async fn popular_tags(
    State(ctx): State<AppContext>,
    Query(query): Query<PopularTagsQuery>,
) -> Result<Json<Vec<PopularTagResponse>>, AppError> {
    let conn = clipvault_db::get_conn(&ctx.db)?;
    let items = tags::popular_tags(&conn, query.limit.clamp(1, 100))?;
    Ok(Json(
        items
            .into_iter()
            .map(|(tag, count)| PopularTagResponse {
                id: tag.id.to_string(),
                name: tag.name,
                count,
            })
            .collect(),
    ))
}

/// GET /api/tags/:id
#[utoipa::path(
    get,
    path = "/api/tags/{id}",
    params(("id" = String, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Tag details", body = TagResponse),
        (status = 404, description = "Tag not found")
    )
)]
pub async fn get_tag(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<TagResponse>, AppError> {
    let tag_id = parse_tag_id(&id)?;
    let conn = clipvault_db::get_conn(&ctx.db)?;
    let tag = tags::get_tag(&conn, tag_id)?
        .ok_or_else(|| clipvault_core::Error::not_found("tag", tag_id))?;
    Ok(Json(TagResponse::from_model(&tag)))
}

/// DELETE /api/tags/:id
#[utoipa::path(
    delete,
    path = "/api/tags/{id}",
    params(("id" = String, Path, description = "Tag ID")),
    responses(
        (status = 204, description = "Tag deleted, links removed"),
        (status = 404, description = "Tag not found")
    )
)]
pub async fn delete_tag(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tag_id = parse_tag_id(&id)?;
    let conn = clipvault_db::get_conn(&ctx.db)?;
    if !tags::delete_tag(&conn, tag_id)? {
        return Err(clipvault_core::Error::not_found("tag", tag_id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
