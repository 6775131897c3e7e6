use axum::routing::{get, patch, post};
use tower_cookies::CookieManagerLayer;

use crate::errors::ApiResponse;
use crate::state::AppState;

pub mod users;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/api/v1/healthcheck", get(healthcheck))
        // Account creation and session lifecycle
        .route("/api/v1/users/register", post(users::register))
        .route("/api/v1/users/login", post(users::login))
        .route("/api/v1/users/logout", post(users::logout))
        .route("/api/v1/users/refresh-token", post(users::refresh_token))
        .route("/api/v1/users/change-password", post(users::change_password))
        // Profile
        .route("/api/v1/users/me", get(users::current_user))
        .route("/api/v1/users/update-account", patch(users::update_account))
        .route("/api/v1/users/avatar", patch(users::update_avatar))
        .route("/api/v1/users/cover-image", patch(users::update_cover_image))
        .layer(CookieManagerLayer::new())
        // Add trace layer for debugging
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn healthcheck() -> ApiResponse<serde_json::Value> {
    ApiResponse::ok(serde_json::json!({}), "ok")
}
