use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new().route("/users", post(handlers::create_user))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/unread-count",
            get(handlers::unread_count),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
        .route(
            "/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
}
