//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - User registration
//! - POST /api/v1/auth/login - User login
//! - POST /api/v1/auth/logout - User logout
//! - GET /api/v1/auth/me - Get current user

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::api::extract::JsonBody;
use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::ApiResponse;
use crate::models::User;
use crate::services::user::{LoginDraft, RegisterDraft};

/// Login result: the bearer token and the logged-in user
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// POST /api/v1/auth/register - User registration
async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterDraft>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state.user_service.register(body).await?;
    Ok(ApiResponse::with_object("User created successfully", user))
}

/// POST /api/v1/auth/login - User login
///
/// Returns the session token in the body and as an http-only cookie.
async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, user) = state.user_service.login(body).await?;

    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id, max_age
    );

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::internal_error(format!("Invalid session cookie: {}", e)))?,
    );

    Ok((
        response_headers,
        ApiResponse::with_object(
            "Login successful",
            AuthResponse {
                token: session.id,
                user,
            },
        ),
    ))
}

/// POST /api/v1/auth/logout - User logout
///
/// Requires authentication.
async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::forbidden("Missing authentication token"))?;

    state.user_service.logout(&token).await?;
    tracing::info!("User {} logged out", user.0.id);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );

    Ok((response_headers, ApiResponse::message("Logout successful")))
}

/// GET /api/v1/auth/me - Get current user
///
/// Requires authentication.
async fn get_current_user(user: AuthenticatedUser) -> Json<ApiResponse<User>> {
    ApiResponse::with_object("Current user", user.0)
}
