use std::convert::Infallible;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing, Router};
use tower::limit::ConcurrencyLimitLayer;

use transcript_common::sink::RowSink;

use super::webhook;

pub type SharedSink = Arc<dyn RowSink + Send + Sync>;

pub fn add_routes(
    router: Router,
    sink: SharedSink,
    max_body_size: usize,
    concurrency_limit: usize,
) -> Router {
    router
        .route("/", routing::get(index))
        .route("/_readiness", routing::get(index))
        .route("/_liveness", routing::get(index)) // No async loop for now, just check axum health
        .route(
            "/webhook",
            routing::post(webhook::post)
                .with_state(sink)
                .layer::<_, Infallible>(ConcurrencyLimitLayer::new(concurrency_limit))
                .layer(DefaultBodyLimit::max(max_body_size)),
        )
}

pub async fn index() -> &'static str {
    "transcript-hook api"
}
