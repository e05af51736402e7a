use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/status", get(api::status))
        .route(
            "/api/migrations",
            get(api::handle_get).post(api::handle_post),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
