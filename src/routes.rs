use crate::{handlers, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Creates the Axum router and associates routes with handlers.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/memes", get(handlers::list_memes))
        .route("/memes/{id}", get(handlers::get_meme))
        .route("/memes/{id}/like", post(handlers::toggle_like))
        .route(
            "/memes/{id}/comments",
            get(handlers::list_comments).post(handlers::add_comment),
        )
        .route("/profile", get(handlers::get_profile).put(handlers::save_profile))
        .route("/profile/picture", post(handlers::upload_profile_picture))
        .route("/leaderboard", get(handlers::get_leaderboard))
        .route("/templates", get(handlers::list_templates))
        .route("/templates/{id}/preview", get(handlers::caption_preview))
        .route("/upload", post(handlers::upload_meme))
        // Middleware Layers
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}
