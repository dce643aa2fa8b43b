//! Kronehit playlist source
//!
//! The Kronehit "Hitsuche" endpoint returns the tracks played in a short
//! window before a requested day/hour/minute. Items only carry a `HH:MM` play
//! time, no date, so the date of each item has to be inferred from the time
//! the request was issued for.
//!
//! # Cursor
//! `next_fetch_time` always lies in the past: it starts 7 minutes before now
//! and after every batch moves to the oldest returned airtime minus the same
//! 7 minute correction. The correction absorbs clock skew between crawler and
//! station so a track right at the batch boundary is not lost.
//!
//! # Midnight inference
//! A batch may straddle midnight, or the request may be issued just after
//! midnight for tracks played before it. When either is detected, each item's
//! date is corrected relative to the fetch time with a noon pivot (see
//! [`corrected_play_date`]). Only one midnight crossing per batch can be
//! resolved this way; windows drifting more than a day are not handled.

use super::{skip_rate, SourceError, TrackSource};
use crate::http::HttpGet;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike};
use chrono_tz::Tz;
use rcc_common::{time, TrackRecord};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Ledger station id
pub const STATION_ID: &str = "kronehit";

/// Maximum upstream requests per crawl run
pub const REQUEST_LIMIT: u32 = 10;

/// Safety margin subtracted from every cursor move, in minutes
pub const TIME_CORRECTION_MINUTES: i64 = 7;

const API_URL: &str = "https://www.kronehit.at/alles-ueber-kronehit/hitsuche/";
const CHANNEL: u32 = 1;

fn time_correction() -> Duration {
    Duration::minutes(TIME_CORRECTION_MINUTES)
}

/// One playlist entry as published upstream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KronehitItem {
    /// `HH:MM`, Vienna time, no date
    #[serde(alias = "playTime")]
    pub play_time: String,
    #[serde(alias = "artistName")]
    pub artist_name: String,
    #[serde(alias = "trackName")]
    pub track_name: String,
}

impl KronehitItem {
    pub fn new(play_time: &str, artist_name: &str, track_name: &str) -> Self {
        Self {
            play_time: play_time.to_string(),
            artist_name: artist_name.to_string(),
            track_name: track_name.to_string(),
        }
    }

    /// Hour part of the play time; unparseable hours count as 0
    pub fn hour(&self) -> u32 {
        self.play_time
            .split(':')
            .next()
            .and_then(|h| h.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Absolute record for this item, aired on `play_date`
    pub fn to_track_record(&self, play_date: NaiveDate) -> Result<TrackRecord, SourceError> {
        let time_of_day = NaiveTime::parse_from_str(&self.play_time, "%H:%M").map_err(|e| {
            SourceError::Decode(format!("play time `{}`: {}", self.play_time, e))
        })?;
        let timestamp = time::local_timestamp(play_date, time_of_day)?;

        Ok(TrackRecord::track(
            STATION_ID,
            timestamp,
            self.artist_name.as_str(),
            self.track_name.as_str(),
        ))
    }
}

/// Response body of one playlist request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KronehitItems {
    #[serde(rename = "Items", alias = "items", default)]
    pub items: Vec<KronehitItem>,
}

impl KronehitItems {
    pub fn new(items: Vec<KronehitItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First item's hour is later than the last item's hour
    pub fn spans_midnight(&self) -> bool {
        match (self.items.first(), self.items.last()) {
            (Some(first), Some(last)) if self.items.len() > 1 => first.hour() > last.hour(),
            _ => false,
        }
    }

    /// First item's hour is later than the hour the request was issued for
    pub fn fetched_over_midnight(&self, fetch_time: &DateTime<Tz>) -> bool {
        self.items
            .first()
            .map(|first| first.hour() > fetch_time.hour())
            .unwrap_or(false)
    }

    /// Resolve every item to an absolute record
    ///
    /// Items that fail to parse, or that `skip` rejects, are dropped with a
    /// log line. Output keeps upstream order.
    pub fn to_track_records<F>(&self, fetch_time: &DateTime<Tz>, skip: F) -> Vec<TrackRecord>
    where
        F: Fn(&TrackRecord) -> bool,
    {
        let needs_correction = self.spans_midnight() || self.fetched_over_midnight(fetch_time);

        let mut records = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let play_date = if needs_correction {
                corrected_play_date(fetch_time, item.hour())
            } else {
                fetch_time.date_naive()
            };

            let record = match item.to_track_record(play_date) {
                Ok(record) => record,
                Err(e) => {
                    error!(
                        play_time = %item.play_time,
                        artist = %item.artist_name,
                        error = %e,
                        "Unable to extract track record from item"
                    );
                    continue;
                }
            };

            if skip(&record) {
                info!(
                    artist = %item.artist_name,
                    title = %item.track_name,
                    play_time = %item.play_time,
                    "Skipping item newer than or equal to last fetched track"
                );
                continue;
            }
            records.push(record);
        }
        records
    }
}

/// Calendar day an item belongs to, given only its hour and the fetch time
///
/// Noon is the pivot: fetched in the morning, an afternoon/evening item is from
/// the previous day; fetched in the afternoon/evening, a morning item is from
/// the next day. Everything else shares the fetch time's day.
pub fn corrected_play_date(fetch_time: &DateTime<Tz>, item_hour: u32) -> NaiveDate {
    let fetch_date = fetch_time.date_naive();
    let fetch_hour = fetch_time.hour();

    let corrected = if fetch_hour < 12 && item_hour > 12 {
        fetch_date.pred_opt()
    } else if fetch_hour >= 12 && item_hour <= 12 {
        fetch_date.succ_opt()
    } else {
        Some(fetch_date)
    };
    corrected.unwrap_or(fetch_date)
}

/// Playlist lookup by point in time
#[async_trait]
pub trait KronehitApi: Send + Sync {
    async fn get_items(&self, at: DateTime<Tz>) -> Result<KronehitItems, SourceError>;
}

/// HTTP implementation of [`KronehitApi`]
pub struct KronehitHttpApi {
    http: Arc<dyn HttpGet>,
}

impl KronehitHttpApi {
    pub fn new(http: Arc<dyn HttpGet>) -> Self {
        Self { http }
    }

    /// Request URL for the window ending at `at`
    pub fn url(at: &DateTime<Tz>) -> String {
        format!(
            "{}?format=json&day={}&channel={}&hours={:02}&minutes={:02}",
            API_URL,
            at.format("%Y-%m-%d"),
            CHANNEL,
            at.hour(),
            at.minute()
        )
    }
}

#[async_trait]
impl KronehitApi for KronehitHttpApi {
    async fn get_items(&self, at: DateTime<Tz>) -> Result<KronehitItems, SourceError> {
        let url = Self::url(&at);
        let body = self.http.get(&url).await?;

        serde_json::from_slice(&body).map_err(|e| {
            error!(url = %url, error = %e, "Unmarshalling Kronehit response failed");
            SourceError::Decode(e.to_string())
        })
    }
}

/// Time cursor, owned exclusively by one [`KronehitSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KronehitCursor {
    /// Point in time the next request is issued for
    pub next_fetch_time: DateTime<Tz>,
    /// Requests issued so far in this run
    pub fetch_counter: u32,
}

/// Time-cursor source for Kronehit
pub struct KronehitSource {
    api: Box<dyn KronehitApi>,
    cursor: KronehitCursor,
}

impl KronehitSource {
    /// Start crawling 7 minutes in the past
    pub fn new(api: Box<dyn KronehitApi>) -> Self {
        // Always crawl in the past to avoid inconsistent data
        let next_fetch_time = time::now_in_reference_tz() - time_correction();
        info!(
            next_fetch_time = %next_fetch_time.format("%Y-%m-%d %H:%M:%S"),
            "Kronehit cursor initialized"
        );
        Self::with_cursor(api, next_fetch_time)
    }

    /// Start crawling from an explicit point in time
    pub fn with_cursor(api: Box<dyn KronehitApi>, next_fetch_time: DateTime<Tz>) -> Self {
        Self {
            api,
            cursor: KronehitCursor {
                next_fetch_time,
                fetch_counter: 0,
            },
        }
    }

    pub fn cursor(&self) -> &KronehitCursor {
        &self.cursor
    }
}

#[async_trait]
impl TrackSource for KronehitSource {
    fn name(&self) -> &'static str {
        STATION_ID
    }

    async fn next_batch(&mut self) -> Result<Vec<TrackRecord>, SourceError> {
        if self.cursor.fetch_counter >= REQUEST_LIMIT {
            error!(limit = REQUEST_LIMIT, "Kronehit request limit exceeded");
            return Err(SourceError::RequestLimitExceeded(REQUEST_LIMIT));
        }

        let fetch_time = self.cursor.next_fetch_time;
        let items = self.api.get_items(fetch_time).await.map_err(|e| {
            error!(error = %e, "Unable to fetch items from Kronehit");
            e
        })?;

        info!(count = items.len(), "Fetched items from Kronehit");

        // Anything at or after the previous request point was already returned
        let newest_allowed = (fetch_time + time_correction()).timestamp();
        let mut records = items.to_track_records(&fetch_time, |record| {
            record.timestamp >= newest_allowed
        });

        if records.is_empty() {
            warn!(
                items = items.len(),
                skip_rate_pct = skip_rate(0, items.len()),
                "Unable to extract any track records"
            );
            return Err(SourceError::NoRecords(items.len()));
        }

        // Upstream order is not reliable
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(oldest) = records.last() {
            self.cursor.next_fetch_time =
                time::from_timestamp(oldest.timestamp)? - time_correction();
        }
        self.cursor.fetch_counter += 1;

        debug!(
            next_fetch_time = %self.cursor.next_fetch_time.format("%Y-%m-%d %H:%M"),
            fetch_counter = self.cursor.fetch_counter,
            "Kronehit cursor advanced"
        );
        info!(
            records = records.len(),
            items = items.len(),
            skip_rate_pct = skip_rate(records.len(), items.len()),
            "Returned track records"
        );
        Ok(records)
    }
}
