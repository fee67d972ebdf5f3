//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the application router.
///
/// The body limit is the configured upload ceiling plus multipart overhead,
/// so slightly oversized files still reach intake and get a precise 413.
///
/// NOTE: Path params use `*param` / `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.body_limit();

    Router::new()
        .route("/", get(endpoints::index::page))
        .route("/health", get(endpoints::health::check))
        .route("/api/analyze", post(endpoints::analyze::analyze))
        .route("/download/*name", get(endpoints::download::download))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}
