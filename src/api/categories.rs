//! Category API endpoints
//!
//! - GET /api/v1/categories - List categories (admin)
//! - POST /api/v1/categories - Create category (admin)
//! - GET /api/v1/categories/{id} - Get category
//! - PUT /api/v1/categories/{id} - Update category (admin)
//! - DELETE /api/v1/categories/{id} - Delete category unless a theme or content block uses it (admin)

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::extract::JsonBody;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ApiResponse;
use crate::models::{Category, ListQuery};
use crate::services::category::CategoryDraft;

/// Routes open to any authenticated user
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_category))
}

/// Routes limited to administrators
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/{id}", axum::routing::put(update_category).delete(delete_category))
}

async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Category>>>, ApiError> {
    let categories = state.category_service.list(&query).await?;
    Ok(ApiResponse::with_object("Categories found", categories))
}

async fn create_category(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CategoryDraft>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state.category_service.create(body).await?;
    Ok(ApiResponse::with_object("Category created successfully", category))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state.category_service.get(id).await?;
    Ok(ApiResponse::with_object("Category found", category))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<CategoryDraft>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state.category_service.update(id, body).await?;
    Ok(ApiResponse::with_object("Category updated successfully", category))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.category_service.delete(id).await?;
    Ok(ApiResponse::message("Category deleted successfully"))
}
