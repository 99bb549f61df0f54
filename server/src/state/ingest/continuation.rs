use std::time::Duration;

use async_trait::async_trait;
use derive_more::derive::Display;
use url::Url;

use crate::server_config::ServerConfig;
use crate::HttpClient;

use super::events::BatchEvent;

#[derive(Debug, Display)]
pub enum ContinuationError {
    #[display("could not dispatch continuation: {_0}")]
    Request(reqwest::Error),
    #[display("continuation dispatch timed out")]
    Timeout,
    #[display("continuation was not accepted, status {_0}")]
    Rejected(u16),
    #[display("continuation endpoint is invalid: {_0}")]
    InvalidEndpoint(url::ParseError),
}

impl std::error::Error for ContinuationError {}

impl From<reqwest::Error> for ContinuationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ContinuationError::Timeout
        } else {
            ContinuationError::Request(e)
        }
    }
}

/// Dispatches the next page of a batch scan as a separate invocation.
#[async_trait]
pub trait ContinuationScheduler: Send + Sync {
    async fn schedule(&self, continuation_token: &str) -> Result<(), ContinuationError>;
}

/// Posts a `BatchEvent` to the batch route in event mode, so the receiver
/// acknowledges right away and runs the page in the background.
pub struct HttpContinuationScheduler {
    http_client: HttpClient,
    endpoint: Url,
    timeout: Duration,
}

impl HttpContinuationScheduler {
    pub fn new(http_client: HttpClient, endpoint: Url, timeout: Duration) -> Self {
        let mut endpoint = endpoint;
        endpoint.query_pairs_mut().append_pair("mode", "event");
        Self {
            http_client,
            endpoint,
            timeout,
        }
    }

    pub fn from_config(
        http_client: HttpClient,
        config: &ServerConfig,
    ) -> Result<Self, ContinuationError> {
        let endpoint = config
            .continuation_endpoint()
            .map_err(ContinuationError::InvalidEndpoint)?;
        Ok(Self::new(
            http_client,
            endpoint,
            Duration::from_secs(config.continuation.timeout_secs),
        ))
    }
}

#[async_trait]
impl ContinuationScheduler for HttpContinuationScheduler {
    async fn schedule(&self, continuation_token: &str) -> Result<(), ContinuationError> {
        let event = BatchEvent {
            continuation_token: Some(continuation_token.to_string()),
        };

        let resp = self
            .http_client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&event)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ContinuationError::Rejected(resp.status().as_u16()));
        }

        tracing::info!("Scheduled continuation from token {}", continuation_token);
        Ok(())
    }
}
