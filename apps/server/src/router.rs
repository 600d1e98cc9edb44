use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Builds the full HTTP surface over `state`.
pub fn init(state: AppState) -> Router {
    let api = Router::new()
        .route("/files", get(handlers::list_files).delete(handlers::remove_all))
        .route(
            "/upload/{name}",
            post(handlers::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/text", post(handlers::add_text))
        .route("/remove", post(handlers::remove));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/files/{name}", get(handlers::download))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
