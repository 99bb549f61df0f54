use std::time::Duration;

use axum::{
    extract::{MatchedPath, Request},
    http::HeaderName,
    response::Response,
    Router,
};
use tower_http::{
    classify::ServerErrorsFailureClass,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wraps `router` so every invocation gets a request id and a span carrying it.
pub fn with_request_tracing(router: Router) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            let path = request
                .extensions()
                .get::<MatchedPath>()
                .map(|p| p.as_str().to_string())
                .unwrap_or_else(|| request.uri().path().to_string());
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            tracing::info_span!(
                "invocation",
                method = %request.method(),
                path = %path,
                request_id = %request_id
            )
        })
        .on_response(|response: &Response, latency: Duration, span: &tracing::Span| {
            tracing::info!(
                parent: span,
                status = response.status().as_u16(),
                latency_ms = latency.as_millis() as u64,
                "invocation completed"
            );
        })
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, span: &tracing::Span| {
                tracing::error!(
                    parent: span,
                    latency_ms = latency.as_millis() as u64,
                    error = %error,
                    "invocation failed"
                );
            },
        );

    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    router
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(header.clone()))
        .layer(SetRequestIdLayer::new(header, MakeRequestUuid))
}
