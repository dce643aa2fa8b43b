//! Upstream HTTP transport
//!
//! Station endpoints are scraped, not official APIs, so every request goes
//! out with a desktop-browser `User-Agent` and a short fixed timeout. A timeout
//! surfaces as an error to the caller; nothing here retries.

use async_trait::async_trait;
use reqwest::header;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Generic browser identity sent to scraped endpoints
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/60.0.3112.113 Safari/537.36";

/// Transport errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP error {0} from {1}")]
    Status(u16, String),
}

/// Minimal GET capability used by the scraped-endpoint sources
#[async_trait]
pub trait HttpGet: Send + Sync {
    /// Fetch `url` and return the raw body
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError>;
}

/// Build a reqwest client with the shared timeout and browser identity
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, HttpError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(BROWSER_USER_AGENT),
    );

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| HttpError::NetworkError(e.to_string()))
}

/// reqwest-backed [`HttpGet`]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl HttpGet for HttpClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            error!(url = %url, error = %e, "HTTP request failed");
            HttpError::NetworkError(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16(), url.to_string()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::NetworkError(e.to_string()))?;

        info!(url = %url, bytes = body.len(), "HTTP call executed");
        Ok(body.to_vec())
    }
}
