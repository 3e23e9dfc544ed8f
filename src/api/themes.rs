//! Theme API endpoints
//!
//! - GET /api/v1/themes - List themes
//! - POST /api/v1/themes - Create theme (admin)
//! - GET /api/v1/themes/{id} - Get theme with its categories expanded
//! - PUT /api/v1/themes/{id} - Update theme (admin)
//! - DELETE /api/v1/themes/{id} - Delete theme unless content uses it (admin)

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::api::extract::JsonBody;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ApiResponse;
use crate::models::{ListQuery, Theme, ThemeDetail};
use crate::services::theme::ThemeDraft;

/// Routes open to any authenticated user
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_themes))
        .route("/{id}", get(get_theme))
}

/// Routes limited to administrators
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_theme))
        .route("/{id}", put(update_theme).delete(delete_theme))
}

async fn list_themes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Theme>>>, ApiError> {
    let themes = state.theme_service.list(&query).await?;
    Ok(ApiResponse::with_object("Themes found", themes))
}

async fn create_theme(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ThemeDraft>,
) -> Result<Json<ApiResponse<Theme>>, ApiError> {
    let theme = state.theme_service.create(body).await?;
    Ok(ApiResponse::with_object("Theme created successfully", theme))
}

async fn get_theme(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ThemeDetail>>, ApiError> {
    let theme = state.theme_service.get(id).await?;
    Ok(ApiResponse::with_object("Theme found", theme))
}

async fn update_theme(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ThemeDraft>,
) -> Result<Json<ApiResponse<Theme>>, ApiError> {
    let theme = state.theme_service.update(id, body).await?;
    Ok(ApiResponse::with_object("Theme updated successfully", theme))
}

async fn delete_theme(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.theme_service.delete(id).await?;
    Ok(ApiResponse::message("Theme deleted successfully"))
}
