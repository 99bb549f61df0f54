use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    error::IngestError,
    model::response::InvocationResponse,
    state::ingest::{BatchEvent, Ingestor, ObjectCreatedEvent},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokeMode {
    /// Run to completion and return the result.
    #[default]
    Sync,
    /// Acknowledge immediately and run in the background.
    Event,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvokeParams {
    #[serde(default)]
    pub mode: InvokeMode,
}

pub async fn object_created(State(ingestor): State<Ingestor>, body: Bytes) -> InvocationResponse {
    let event = match serde_json::from_slice::<ObjectCreatedEvent>(&body) {
        Ok(event) => event,
        Err(e) => return IngestError::InvalidEvent(e.to_string()).into(),
    };

    ingestor.handle_object_created(event).await
}

pub async fn batch(
    State(ingestor): State<Ingestor>,
    Query(params): Query<InvokeParams>,
    body: Bytes,
) -> InvocationResponse {
    let event = if body.iter().all(|b| b.is_ascii_whitespace()) {
        BatchEvent::default()
    } else {
        match serde_json::from_slice::<BatchEvent>(&body) {
            Ok(event) => event,
            Err(e) => return IngestError::InvalidEvent(e.to_string()).into(),
        }
    };

    match params.mode {
        InvokeMode::Sync => ingestor.handle_batch(event).await,
        InvokeMode::Event => {
            tracing::info!(
                "Batch accepted, continuation token: {:?}",
                event.continuation_token
            );
            tokio::spawn(async move {
                let response = ingestor.handle_batch(event).await;
                tracing::info!(
                    "Background batch finished with status {}",
                    response.status_code
                );
            });
            InvocationResponse::new(StatusCode::ACCEPTED, "Batch accepted")
        }
    }
}
