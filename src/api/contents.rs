//! Content API endpoints
//!
//! - GET /api/v1/contents - List contents (public)
//! - POST /api/v1/contents - Create content (creator, admin)
//! - GET /api/v1/contents/{id} - Get content with theme, creator and blocks expanded
//! - PUT /api/v1/contents/{id} - Replace content and reconcile its blocks (creator, admin)
//! - DELETE /api/v1/contents/{id} - Delete content and its blocks (creator, admin)

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::api::extract::JsonBody;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::ApiResponse;
use crate::models::{Content, ContentDetail, ListQuery};
use crate::services::content::ContentDraft;

/// Public routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_contents))
}

/// Routes open to any authenticated user
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_content))
}

/// Routes limited to creators and administrators
pub fn author_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_content))
        .route("/{id}", put(update_content).delete(delete_content))
}

async fn list_contents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Content>>>, ApiError> {
    let contents = state.content_service.list(&query).await?;
    Ok(ApiResponse::with_object("Contents found", contents))
}

async fn create_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(body): JsonBody<ContentDraft>,
) -> Result<Json<ApiResponse<Content>>, ApiError> {
    let content = state
        .content_service
        .create(&user.principal(), body)
        .await?;
    Ok(ApiResponse::with_object("Content created successfully", content))
}

async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ContentDetail>>, ApiError> {
    let content = state.content_service.get(id).await?;
    Ok(ApiResponse::with_object("Content found", content))
}

async fn update_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ContentDraft>,
) -> Result<Json<ApiResponse<Content>>, ApiError> {
    let content = state
        .content_service
        .update(&user.principal(), id, body)
        .await?;
    Ok(ApiResponse::with_object("Content updated successfully", content))
}

async fn delete_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .content_service
        .delete(&user.principal(), id)
        .await?;
    Ok(ApiResponse::message("Content deleted successfully"))
}
