use std::{net::IpAddr, time::Duration};

use async_trait::async_trait;
use derive_more::derive::Display;
use url::Url;

use crate::server_config::AddressConfig;
use crate::HttpClient;

#[derive(Debug, Display)]
pub enum AddressLookupError {
    #[display("address lookup request failed: {_0}")]
    Request(reqwest::Error),
    #[display("address lookup timed out")]
    Timeout,
    #[display("address lookup returned an invalid address: {_0:?}")]
    InvalidAddress(String),
}

impl std::error::Error for AddressLookupError {}

impl From<reqwest::Error> for AddressLookupError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AddressLookupError::Timeout
        } else {
            AddressLookupError::Request(e)
        }
    }
}

/// Discovers the public address this process reaches the document store from.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self) -> Result<IpAddr, AddressLookupError>;
}

/// Asks a plain-text "what is my address" service.
pub struct HttpAddressResolver {
    http_client: HttpClient,
    lookup_url: Url,
    timeout: Duration,
}

impl HttpAddressResolver {
    pub fn new(http_client: HttpClient, config: &AddressConfig) -> Self {
        Self {
            http_client,
            lookup_url: config.lookup_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self) -> Result<IpAddr, AddressLookupError> {
        let text = self
            .http_client
            .get(self.lookup_url.clone())
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let text = text.trim();
        text.parse::<IpAddr>()
            .map_err(|_| AddressLookupError::InvalidAddress(text.to_string()))
    }
}
