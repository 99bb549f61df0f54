use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::{request_tracing, ServerState};

use super::handlers::{handler_404, invoke};

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        let router = Router::new()
            .route("/", get(|| async { "Offer ingest server" }))
            .route("/invoke/object-created", post(invoke::object_created))
            .route("/invoke/batch", post(invoke::batch))
            .layer(DefaultBodyLimit::max(1024 * 1024))
            .with_state(state)
            .fallback(handler_404);

        request_tracing::with_request_tracing(router)
    }
}
