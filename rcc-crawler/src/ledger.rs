//! Ledger client ("home base")
//!
//! The ledger is the durable store the crawler forwards records to. The
//! crawler only needs two operations: read the latest record of a station and
//! persist one record. "No data" on read is a recognized sentinel and is kept
//! distinct from every other failure.
//!
//! # Wire format
//! - `GET  https://{host}/stations/{id}/tracks?filter=latest` (header `X-API-KEY`)
//! - `PUT  https://{host}/stations/{id}/tracks/{timestamp}` (header `Authorization: Bearer`)
//!
//! Every response is wrapped as `{"success": bool, "message": .., "data": ..}`.

use async_trait::async_trait;
use rcc_common::TrackRecord;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Ledger client errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger answered but holds nothing for the request
    #[error("request did not return any data")]
    NoData,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Illegal response format: {0}")]
    IllegalFormat(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Read/write contract the crawler needs from the ledger
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Most recent persisted record of `station_id`, or [`LedgerError::NoData`]
    async fn latest_track_record(&self, station_id: &str) -> Result<TrackRecord, LedgerError>;

    /// Persist one record
    async fn persist_track_record(&self, record: &TrackRecord) -> Result<(), LedgerError>;
}

/// Connection settings for [`HomeBaseConnector`]
#[derive(Debug, Clone)]
pub struct HomeBaseSettings {
    /// API host without scheme
    pub api_host: String,
    /// Key for read requests
    pub api_key: String,
    /// Bearer token for write requests
    pub api_authorization: String,
    /// Per-request timeout
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: Option<bool>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

/// Unwrap a ledger response envelope into its `data` payload
fn data_from_body(body: &[u8]) -> Result<Value, LedgerError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| {
        error!(error = %e, "Unable to unmarshal ledger response");
        LedgerError::ParseError(e.to_string())
    })?;

    match envelope.success {
        None => {
            let raw = String::from_utf8_lossy(body).into_owned();
            error!(body = %raw, "Illegal ledger response format");
            Err(LedgerError::IllegalFormat(raw))
        }
        Some(false) => {
            let reason = envelope.message.unwrap_or(serde_json::Value::Null);
            warn!(reason = %reason, "Ledger request did not return any data");
            Err(LedgerError::NoData)
        }
        Some(true) => Ok(envelope.data.unwrap_or(Value::Null)),
    }
}

/// HTTP implementation of [`Ledger`]
pub struct HomeBaseConnector {
    http_client: reqwest::Client,
    settings: HomeBaseSettings,
}

impl HomeBaseConnector {
    pub fn new(settings: HomeBaseSettings) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LedgerError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    fn latest_url(&self, station_id: &str) -> String {
        format!(
            "https://{}/stations/{}/tracks?filter=latest",
            self.settings.api_host, station_id
        )
    }

    fn persist_url(&self, record: &TrackRecord) -> String {
        format!(
            "https://{}/stations/{}/tracks/{}",
            self.settings.api_host, record.station_id, record.timestamp
        )
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Value, LedgerError> {
        let response = request.send().await.map_err(|e| {
            error!(url = %url, error = %e, "Unable to call ledger endpoint");
            LedgerError::NetworkError(e.to_string())
        })?;

        let body = response.bytes().await.map_err(|e| {
            error!(url = %url, error = %e, "Unable to read ledger response body");
            LedgerError::NetworkError(e.to_string())
        })?;

        data_from_body(&body)
    }
}

#[async_trait]
impl Ledger for HomeBaseConnector {
    async fn latest_track_record(&self, station_id: &str) -> Result<TrackRecord, LedgerError> {
        let url = self.latest_url(station_id);
        let request = self
            .http_client
            .get(&url)
            .header("X-API-KEY", &self.settings.api_key);

        let data = self.send(request, &url).await.map_err(|e| {
            warn!(url = %url, error = %e, "Unable to get latest track record");
            e
        })?;

        serde_json::from_value(data).map_err(|e| {
            error!(error = %e, "Unable to decode latest track record");
            LedgerError::ParseError(e.to_string())
        })
    }

    async fn persist_track_record(&self, record: &TrackRecord) -> Result<(), LedgerError> {
        let url = self.persist_url(record);
        let request = self
            .http_client
            .put(&url)
            .bearer_auth(&self.settings.api_authorization)
            .json(&record.track);

        let data = self.send(request, &url).await?;
        info!(record = %record, response = %data, "Track record persisted");
        Ok(())
    }
}
