//! Upstream track sources
//!
//! Each station family gets one [`TrackSource`] implementation. The crawler
//! drives a source by calling [`TrackSource::next_batch`] repeatedly until it
//! has caught up with the ledger; the source keeps its own cursor and moves it
//! toward older history on every successful call.
//!
//! # Sources
//! 1. **kronehit** - scraped time-of-day endpoint, time cursor with midnight inference
//! 2. **hitradio_oe3** - social feed, opaque `max_id` pagination cursor
//! 3. **orf** - broadcaster JSON snapshot, single shot per run
//!
//! Every source bounds the number of upstream requests per run. Exceeding the
//! ceiling is an error, which ends the crawl even if the upstream never lets
//! it catch up.

pub mod hitradio_oe3;
pub mod kronehit;
pub mod orf;

use crate::http::HttpError;
use async_trait::async_trait;
use rcc_common::TrackRecord;
use thiserror::Error;

pub use hitradio_oe3::HitradioOe3Source;
pub use kronehit::KronehitSource;
pub use orf::OrfSource;

/// Source errors
///
/// All of these are fatal for the current crawl run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Http(#[from] HttpError),

    #[error("Upstream API error: {0}")]
    Upstream(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Request limit of {0} exceeded")]
    RequestLimitExceeded(u32),

    #[error("Resource already fetched, nothing more to poll")]
    AlreadyFetched,

    #[error("Unable to extract any track records from {0} items")]
    NoRecords(usize),

    #[error("Invalid source configuration: {0}")]
    Config(String),

    #[error("Common error: {0}")]
    Common(#[from] rcc_common::Error),
}

/// One upstream, polled batch by batch
///
/// Batches are returned newest first. Each successful call advances the
/// internal cursor toward older history.
#[async_trait]
pub trait TrackSource: Send {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Fetch the next batch of candidate records
    async fn next_batch(&mut self) -> Result<Vec<TrackRecord>, SourceError>;
}

/// Share of fetched items that did not make it into the batch, in percent
pub fn skip_rate(extracted: usize, fetched: usize) -> f32 {
    if fetched == 0 {
        return 0.0;
    }
    let skipped = fetched.saturating_sub(extracted);
    skipped as f32 / fetched as f32 * 100.0
}
