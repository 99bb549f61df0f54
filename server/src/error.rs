use axum::http::StatusCode;
use derive_more::derive::Display;

use crate::{
    email::decoded_message::DecodeError,
    model::{response::InvocationResponse, summary_store::StoreError},
    network::{address::AddressLookupError, gate::GateError},
    prompt::claude::SummarizeError,
    state::ingest::continuation::ContinuationError,
    storage::object_store::StorageError,
};

pub type IngestResult<T> = Result<T, IngestError>;

/// Every way a single invocation can end other than success or a filtered skip.
#[derive(Debug, Display)]
pub enum IngestError {
    #[display("address lookup failed: {_0}")]
    AddressLookup(AddressLookupError),
    #[display("allowlist gate error: {_0}")]
    Gate(GateError),
    #[display("invalid path: {_0}")]
    InvalidPath(String),
    #[display("invalid event: {_0}")]
    InvalidEvent(String),
    #[display("decode error: {_0}")]
    Decode(DecodeError),
    #[display("summarize error: {_0}")]
    Summarize(SummarizeError),
    #[display("store connection error: {_0}")]
    StoreConnect(StoreError),
    #[display("store operation error: {_0}")]
    StoreOperation(StoreError),
    #[display("object storage error: {_0}")]
    Storage(StorageError),
    #[display("continuation error: {_0}")]
    Continuation(ContinuationError),
    #[display("internal error: {_0}")]
    Internal(anyhow::Error),
}

impl std::error::Error for IngestError {}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::InvalidPath(_) | IngestError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message placed in the invocation result. Details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            IngestError::InvalidPath(_) => "Invalid path",
            IngestError::InvalidEvent(_) => "Invalid event",
            IngestError::StoreConnect(_) => "Database connection error",
            _ => "Server error",
        }
    }
}

impl From<anyhow::Error> for IngestError {
    fn from(error: anyhow::Error) -> Self {
        IngestError::Internal(error)
    }
}

impl From<DecodeError> for IngestError {
    fn from(error: DecodeError) -> Self {
        IngestError::Decode(error)
    }
}

impl From<SummarizeError> for IngestError {
    fn from(error: SummarizeError) -> Self {
        IngestError::Summarize(error)
    }
}

impl From<StorageError> for IngestError {
    fn from(error: StorageError) -> Self {
        IngestError::Storage(error)
    }
}

impl From<IngestError> for InvocationResponse {
    fn from(error: IngestError) -> Self {
        match error.status_code() {
            StatusCode::BAD_REQUEST => tracing::warn!("Rejected invocation: {}", error),
            _ => tracing::error!("Invocation failed: {}", error),
        }
        InvocationResponse::new(error.status_code(), error.public_message())
    }
}
