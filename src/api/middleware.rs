//! API middleware
//!
//! Contains middleware for:
//! - Authentication (session token validation)
//! - Authorization (role checks per route group)
//!
//! and the uniform `{code, message}` error body every handler returns.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::repositories::{
    SqlxCategoryRepository, SqlxContentRepository, SqlxSessionRepository, SqlxThemeRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::policy::{Principal, ADMIN_ONLY, AUTHORS};
use crate::services::{CategoryService, ContentService, ServiceError, ThemeService, UserService};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub theme_service: Arc<ThemeService>,
    pub content_service: Arc<ContentService>,
}

impl AppState {
    /// Wire repositories and services over `pool`
    pub fn new(pool: DynDatabasePool, session_ttl_hours: i64) -> Self {
        let users = SqlxUserRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let themes = SqlxThemeRepository::boxed(pool.clone());

        Self {
            user_service: Arc::new(UserService::with_session_ttl(
                users.clone(),
                SqlxSessionRepository::boxed(pool.clone()),
                session_ttl_hours,
            )),
            category_service: Arc::new(CategoryService::new(categories.clone())),
            theme_service: Arc::new(ThemeService::new(themes.clone(), categories.clone())),
            content_service: Arc::new(ContentService::new(
                SqlxContentRepository::boxed(pool.clone()),
                themes,
                categories,
                users,
            )),
            pool,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn principal(&self) -> Principal {
        Principal::from(&self.0)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::forbidden("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "FORBIDDEN" | "AUTHENTICATION_FAILED" => StatusCode::FORBIDDEN,
            "MISSING_FIELD" | "VALIDATION_ERROR" => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// The `code` field already names the kind of failure, so variants that wrap
/// a caller-facing sentence send it without the display prefix.
impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = match &err {
            ServiceError::MissingField(_) => "MISSING_FIELD",
            ServiceError::Validation(message) => {
                return ApiError::validation_error(message.as_str())
            }
            ServiceError::InvalidReference(_) => "INVALID_REFERENCE",
            ServiceError::CategoryNotAllowed(_) => "CATEGORY_NOT_ALLOWED",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Forbidden(message) => return ApiError::forbidden(message.as_str()),
            ServiceError::StillReferenced { .. } => "STILL_REFERENCED",
            ServiceError::Duplicate(_) => "DUPLICATE",
            ServiceError::Authentication(message) => {
                return ApiError::new("AUTHENTICATION_FAILED", message.as_str())
            }
            ServiceError::Store(e) => {
                tracing::error!("Store error: {:#}", e);
                return ApiError::internal_error("Internal server error");
            }
        };
        ApiError::new(code, err.to_string())
    }
}

/// Extract session token from request headers.
///
/// Checked in order: `Authorization: Bearer`, `x-access-token`, `session` cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(access_token) = headers.get("x-access-token") {
        if let Ok(token) = access_token.to_str() {
            let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers()).ok_or_else(|| {
        tracing::warn!("Rejected {} {}: no session token", request.method(), request.uri());
        ApiError::forbidden("Missing authentication token")
    })?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::forbidden("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    require_roles(ADMIN_ONLY, request, next).await
}

/// Creator/admin authorization middleware
pub async fn require_author(request: Request, next: Next) -> Result<Response, ApiError> {
    require_roles(AUTHORS, request, next).await
}

async fn require_roles(
    roles: &[UserRole],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::forbidden("Authentication required"))?;

    if !roles.contains(&user.0.role) {
        tracing::warn!(
            "User {} ({}) denied {} {}",
            user.0.id,
            user.0.role,
            request.method(),
            request.uri().path()
        );
        return Err(ApiError::forbidden("Insufficient role"));
    }

    Ok(next.run(request).await)
}
