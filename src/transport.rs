//! HTTP transport for the GraphQL endpoint
//!
//! One call to [`Transport::post`] is one attempt. Retrying is the fetcher's
//! job, so implementations never loop.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::query::GraphQlRequest;

/// Header carrying the API credential
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Connection-level failure of a single attempt (refused, timeout, DNS, ...)
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL so nothing request-specific ends up in logs.
        Self(err.without_url().to_string())
    }
}

/// Status and raw body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one GraphQL request
pub trait Transport {
    fn post(&self, request: &GraphQlRequest) -> Result<RawResponse, TransportError>;
}

/// Blocking reqwest transport
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: String,
    api_key: SecretString,
}

impl HttpTransport {
    pub fn new(
        url: impl Into<String>,
        api_key: SecretString,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Self::new(
            config.api_url.clone(),
            SecretString::from(config.api_key.expose_secret().to_string()),
            config.request_timeout,
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn post(&self, request: &GraphQlRequest) -> Result<RawResponse, TransportError> {
        let resp = self
            .client
            .post(&self.url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(request)
            .send()?;

        let status = resp.status().as_u16();
        let body = resp.text()?;
        Ok(RawResponse { status, body })
    }
}
