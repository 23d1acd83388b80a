//! Axum router construction.
//!
//! Builds the application router with all route groups, middleware layers,
//! and the served OpenAPI document.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::server::context::AppContext;
use crate::server::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::videos::upload_video,
        routes::videos::list_videos,
        routes::videos::search_videos,
        routes::videos::get_video,
        routes::videos::update_video,
        routes::videos::delete_video,
        routes::videos::delete_source,
        routes::fragments::create_fragment,
        routes::fragments::list_fragments,
        routes::fragments::search_fragments,
        routes::fragments::get_fragment,
        routes::fragments::update_fragment,
        routes::fragments::delete_fragment,
        routes::tags::list_tags,
        routes::tags::create_tag,
        routes::tags::popular_tags,
        routes::tags::get_tag,
        routes::tags::delete_tag,
    ),
    components(schemas(
        routes::videos::VideoResponse,
        routes::videos::UpdateVideoRequest,
        routes::fragments::FragmentResponse,
        routes::fragments::CreateFragmentBody,
        routes::fragments::UpdateFragmentRequest,
        routes::tags::TagResponse,
        routes::tags::PopularTagResponse,
        routes::tags::CreateTagRequest,
    ))
)]
struct ApiDoc;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = ctx.config.storage.max_upload_bytes as usize;

    let api = Router::new()
        // Videos
        .route("/videos/upload", post(routes::videos::upload_video))
        .route("/videos", get(routes::videos::list_videos))
        .route("/videos/search", get(routes::videos::search_videos))
        .route(
            "/videos/{id}",
            get(routes::videos::get_video)
                .put(routes::videos::update_video)
                .delete(routes::videos::delete_video),
        )
        .route("/videos/{id}/source", delete(routes::videos::delete_source))
        // Fragments
        .route(
            "/videos/{video_id}/fragments",
            post(routes::fragments::create_fragment).get(routes::fragments::list_fragments),
        )
        .route(
            "/videos/{video_id}/fragments/{id}",
            get(routes::fragments::get_fragment)
                .put(routes::fragments::update_fragment)
                .delete(routes::fragments::delete_fragment),
        )
        .route("/fragments/search", get(routes::fragments::search_fragments))
        // Tags
        .route(
            "/tags",
            get(routes::tags::list_tags).post(routes::tags::create_tag),
        )
        .route("/tags/popular", get(routes::tags::popular_tags))
        .route(
            "/tags/{id}",
            get(routes::tags::get_tag).delete(routes::tags::delete_tag),
        );

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        )
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit.saturating_add(1024 * 1024)))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
