//! User API endpoints
//!
//! - GET /api/v1/users - List users (admin)
//! - GET /api/v1/users/{id} - Get user
//! - PUT /api/v1/users/{id} - Update user (self or admin)
//! - DELETE /api/v1/users/{id} - Delete user and everything they own (admin)

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::extract::JsonBody;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::ApiResponse;
use crate::models::{ListQuery, User};
use crate::services::user::UserUpdateDraft;

/// Routes open to any authenticated user
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_user).put(update_user))
}

/// Routes limited to administrators
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", axum::routing::delete(delete_user))
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let users = state.user_service.list(&query).await?;
    Ok(ApiResponse::with_object("Users found", users))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state.user_service.get(id).await?;
    Ok(ApiResponse::with_object("User found", user))
}

async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<UserUpdateDraft>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let updated = state
        .user_service
        .update(&user.principal(), id, body)
        .await?;
    Ok(ApiResponse::with_object("User updated successfully", updated))
}

async fn delete_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.user_service.delete(&user.principal(), id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}
