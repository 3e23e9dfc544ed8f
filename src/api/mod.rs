//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api/v1`. Route groups carry their role
//! requirements as route layers:
//!
//! | Group          | Layers                          |
//! |----------------|---------------------------------|
//! | public         | none                            |
//! | authenticated  | `require_auth`                  |
//! | authors        | `require_auth`, `require_author`|
//! | admin          | `require_auth`, `require_admin` |

pub mod auth;
pub mod categories;
pub mod contents;
pub mod extract;
pub mod middleware;
pub mod responses;
pub mod themes;
pub mod users;

#[cfg(test)]
mod tests;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use extract::JsonBody;
pub use middleware::{ApiError, AppState, AuthenticatedUser};
pub use responses::ApiResponse;

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .nest("/users", users::admin_router())
        .nest("/categories", categories::admin_router())
        .nest("/themes", themes::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let author_routes = Router::new()
        .nest("/contents", contents::author_router())
        .route_layer(axum_middleware::from_fn(middleware::require_author))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::router())
        .nest("/categories", categories::router())
        .nest("/themes", themes::router())
        .nest("/contents", contents::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .nest("/contents", contents::public_router())
        .merge(admin_routes)
        .merge(author_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::COOKIE,
            HeaderName::from_static("x-access-token"),
        ]);

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) if cors_origin != "*" => cors.allow_origin(origin).allow_credentials(true),
        Ok(_) => cors.allow_origin(tower_http::cors::Any),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin {:?}: {}", cors_origin, e);
            cors
        }
    }
}

/// GET /api/v1/health - Liveness and database reachability
async fn health(State(state): State<AppState>) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.pool.ping().await.map_err(|e| {
        tracing::error!("Health check failed: {:#}", e);
        ApiError::internal_error("Database unavailable")
    })?;
    Ok(ApiResponse::message("OK"))
}
