//! Hitradio Ö3 social feed source
//!
//! Ö3 announces every track on its Twitter account as
//! `<airtime>: "<title>" von <artist>`. The tweet's creation time is used as
//! airtime; it is usually within a minute of the time in the text.
//!
//! # Cursor
//! The timeline is paged with an opaque `max_id` token. Twitter treats
//! `max_id` inclusively, so the tweet the token points at comes back as the
//! first item of the next page and has to be dropped.

use super::{SourceError, TrackSource};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use rcc_common::TrackRecord;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

/// Ledger station id
pub const STATION_ID: &str = "hitradio-oe3";

/// Maximum timeline requests per crawl run
pub const REQUEST_LIMIT: u32 = 10;

const TWITTER_USER_ID: &str = "7901732";
const TWEET_COUNT: u32 = 200;
const TIMELINE_URL: &str = "https://api.twitter.com/1.1/statuses/user_timeline.json";

/// Tweet fields the source needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tweet {
    pub id_str: String,
    /// e.g. `Sun Aug 26 09:39:00 -0700 2018`
    pub created_at: String,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Tweet {
    /// Tweet body, preferring the untruncated text
    pub fn body(&self) -> &str {
        self.full_text
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or_default()
    }

    /// Parse `created_at`
    ///
    /// The weekday is ignored; only date, time and offset are significant.
    pub fn created_at_time(&self) -> Result<DateTime<FixedOffset>, SourceError> {
        let without_weekday = self
            .created_at
            .split_once(' ')
            .map(|(_, rest)| rest)
            .unwrap_or(&self.created_at);
        DateTime::parse_from_str(without_weekday, "%b %d %H:%M:%S %z %Y").map_err(|e| {
            SourceError::Decode(format!("created_at `{}`: {}", self.created_at, e))
        })
    }
}

/// Title is the text between the first pair of double quotes
pub fn title_from_text(text: &str) -> Result<&str, SourceError> {
    let parts: Vec<&str> = text.split('"').collect();
    if parts.len() < 3 {
        return Err(SourceError::Decode(
            "unable to extract title from tweet".to_string(),
        ));
    }
    Ok(parts[1])
}

/// Artist follows the first `" von "`
pub fn artist_from_text(text: &str) -> Result<&str, SourceError> {
    text.split(" von ").nth(1).ok_or_else(|| {
        SourceError::Decode("unable to extract artist from tweet".to_string())
    })
}

/// Map one announcement tweet to a track record
pub fn extract_track_record(tweet: &Tweet) -> Result<TrackRecord, SourceError> {
    let airtime = tweet.created_at_time()?;
    let text = tweet.body();
    let title = title_from_text(text)?;
    let artist = artist_from_text(text)?;

    Ok(TrackRecord::track(STATION_ID, airtime.timestamp(), artist, title))
}

/// Timeline request parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineParams {
    pub user_id: String,
    pub count: u32,
    /// Pagination token; the tweet it names is included in the response
    pub max_id: Option<String>,
}

impl Default for TimelineParams {
    fn default() -> Self {
        Self {
            user_id: TWITTER_USER_ID.to_string(),
            count: TWEET_COUNT,
            max_id: None,
        }
    }
}

impl TimelineParams {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("user_id", self.user_id.clone()),
            ("count", self.count.to_string()),
            ("trim_user", "true".to_string()),
            ("exclude_replies", "true".to_string()),
            ("tweet_mode", "extended".to_string()),
        ];
        if let Some(max_id) = &self.max_id {
            query.push(("max_id", max_id.clone()));
        }
        query
    }
}

/// User timeline lookup
#[async_trait]
pub trait TwitterApi: Send + Sync {
    async fn user_timeline(&self, params: &TimelineParams) -> Result<Vec<Tweet>, SourceError>;
}

/// HTTP implementation of [`TwitterApi`] with app-only bearer auth
pub struct TwitterHttpApi {
    http_client: reqwest::Client,
    bearer_token: String,
}

impl TwitterHttpApi {
    pub fn new(bearer_token: String, timeout: Duration) -> Result<Self, SourceError> {
        if bearer_token.trim().is_empty() {
            return Err(SourceError::Config(
                "Twitter bearer token must not be empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            bearer_token,
        })
    }
}

#[async_trait]
impl TwitterApi for TwitterHttpApi {
    async fn user_timeline(&self, params: &TimelineParams) -> Result<Vec<Tweet>, SourceError> {
        let response = self
            .http_client
            .get(TIMELINE_URL)
            .bearer_auth(&self.bearer_token)
            .query(&params.query())
            .send()
            .await
            .map_err(|e| SourceError::Http(crate::http::HttpError::NetworkError(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Upstream(format!("{}: {}", status, error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

/// Pagination cursor, owned exclusively by one [`HitradioOe3Source`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedCursor {
    /// Oldest tweet id handed out so far
    pub max_id: Option<String>,
    /// Requests issued so far in this run
    pub fetch_counter: u32,
}

/// Feed-cursor source for Hitradio Ö3
pub struct HitradioOe3Source {
    api: Box<dyn TwitterApi>,
    params: TimelineParams,
    cursor: FeedCursor,
}

impl HitradioOe3Source {
    pub fn new(api: Box<dyn TwitterApi>) -> Self {
        Self {
            api,
            params: TimelineParams::default(),
            cursor: FeedCursor::default(),
        }
    }

    pub fn cursor(&self) -> &FeedCursor {
        &self.cursor
    }
}

#[async_trait]
impl TrackSource for HitradioOe3Source {
    fn name(&self) -> &'static str {
        STATION_ID
    }

    async fn next_batch(&mut self) -> Result<Vec<TrackRecord>, SourceError> {
        if self.cursor.fetch_counter >= REQUEST_LIMIT {
            error!(limit = REQUEST_LIMIT, "Twitter request limit exceeded");
            return Err(SourceError::RequestLimitExceeded(REQUEST_LIMIT));
        }

        let params = TimelineParams {
            max_id: self.cursor.max_id.clone(),
            ..self.params.clone()
        };
        let tweets = self.api.user_timeline(&params).await?;
        self.cursor.fetch_counter += 1;

        info!(
            count = tweets.len(),
            user_id = %params.user_id,
            "Fetched tweets from Twitter account"
        );

        let mut records = Vec::with_capacity(tweets.len());
        let mut oldest_seen = None;
        for tweet in &tweets {
            if params.max_id.as_deref() == Some(tweet.id_str.as_str()) {
                // Inclusive pagination: already handed out with the previous page
                info!(id = %tweet.id_str, created_at = %tweet.created_at, "Skipped cursor tweet");
                continue;
            }
            oldest_seen = Some(tweet.id_str.clone());

            match extract_track_record(tweet) {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(
                        text = %tweet.body(),
                        error = %e,
                        "Unable to extract track record from tweet"
                    );
                }
            }
        }

        let Some(oldest) = oldest_seen else {
            // Only the cursor tweet (or nothing) came back: the feed is exhausted
            return Err(SourceError::NoRecords(tweets.len()));
        };
        debug!(max_id = %oldest, "Feed cursor advanced");
        self.cursor.max_id = Some(oldest);

        info!(
            records = records.len(),
            tweets = tweets.len(),
            "Returned track records extracted from tweets"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn tweet(id: &str, created_at: &str, text: &str) -> Tweet {
        Tweet {
            id_str: id.to_string(),
            created_at: created_at.to_string(),
            full_text: Some(text.to_string()),
            text: None,
        }
    }

    fn first_page() -> Vec<Tweet> {
        vec![
            tweet(
                "1",
                "Sun Aug 26 09:39:00 -0700 2018",
                "16:39: \"River\" von Eminem feat. Ed Sheeran",
            ),
            tweet(
                "2",
                "Sun Aug 26 09:35:00 -0700 2018",
                "16:35: \"Last Friday Night\" von Katy Perry",
            ),
            tweet(
                "3",
                "Sun Aug 26 09:32:00 -0700 2018",
                "16:32: \"Hey Jessy\" von Simon Lewis",
            ),
        ]
    }

    fn second_page() -> Vec<Tweet> {
        vec![
            tweet(
                "3",
                "Sun Aug 26 09:32:00 -0700 2018",
                "16:32: \"Hey Jessy\" von Simon Lewis",
            ),
            tweet(
                "4",
                "Sun Aug 26 09:25:00 -0700 2018",
                "16:25: \"Sign of the Times\" von Harry Styles",
            ),
            tweet(
                "5",
                "Sun Aug 26 09:22:00 -0700 2018",
                "16:22: \"Faded\" von Alan Walker",
            ),
        ]
    }

    /// Serves pages keyed by `max_id` and records every request
    struct PagedTimeline {
        requests: Arc<Mutex<Vec<TimelineParams>>>,
        fail: bool,
    }

    #[async_trait]
    impl TwitterApi for PagedTimeline {
        async fn user_timeline(&self, params: &TimelineParams) -> Result<Vec<Tweet>, SourceError> {
            self.requests.lock().unwrap().push(params.clone());
            if self.fail {
                return Err(SourceError::Upstream("error".to_string()));
            }
            Ok(match params.max_id.as_deref() {
                None => first_page(),
                Some("3") => second_page(),
                Some("5") => vec![second_page().remove(2)],
                Some(_) => Vec::new(),
            })
        }
    }

    fn source() -> (HitradioOe3Source, Arc<Mutex<Vec<TimelineParams>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let api = PagedTimeline {
            requests: Arc::clone(&requests),
            fail: false,
        };
        (HitradioOe3Source::new(Box::new(api)), requests)
    }

    #[test]
    fn test_extract_track_record() {
        let record = extract_track_record(&first_page()[0]).unwrap();
        assert_eq!(
            record,
            TrackRecord::track(STATION_ID, 1535301540, "Eminem feat. Ed Sheeran", "River")
        );
    }

    #[test]
    fn test_extract_falls_back_to_short_text() {
        let mut t = first_page().remove(1);
        t.text = t.full_text.take();
        let record = extract_track_record(&t).unwrap();
        assert_eq!(record.title(), "Last Friday Night");
        assert_eq!(record.timestamp, 1535301300);
    }

    #[test]
    fn test_extract_rejects_non_track_tweets() {
        let no_quotes = tweet("9", "Sun Aug 26 09:39:00 -0700 2018", "Jetzt live: Ö3-Wecker");
        assert!(extract_track_record(&no_quotes).is_err());

        let no_artist = tweet("9", "Sun Aug 26 09:39:00 -0700 2018", "16:39: \"River\"");
        assert!(extract_track_record(&no_artist).is_err());

        let bad_date = tweet("9", "yesterday", "16:39: \"River\" von Eminem");
        assert!(extract_track_record(&bad_date).is_err());
    }

    #[test]
    fn test_query_includes_max_id_only_when_set() {
        let params = TimelineParams::default();
        assert!(!params.query().iter().any(|(k, _)| *k == "max_id"));

        let paged = TimelineParams {
            max_id: Some("42".to_string()),
            ..TimelineParams::default()
        };
        assert!(paged.query().contains(&("max_id", "42".to_string())));
        assert!(paged.query().contains(&("user_id", TWITTER_USER_ID.to_string())));
    }

    #[test]
    fn test_empty_bearer_token_rejected() {
        assert!(TwitterHttpApi::new(String::new(), Duration::from_secs(5)).is_err());
        assert!(TwitterHttpApi::new("token".to_string(), Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_next_first_page() {
        let (mut source, requests) = source();

        let records = source.next_batch().await.unwrap();

        assert_eq!(
            records,
            vec![
                TrackRecord::track(STATION_ID, 1535301540, "Eminem feat. Ed Sheeran", "River"),
                TrackRecord::track(STATION_ID, 1535301300, "Katy Perry", "Last Friday Night"),
                TrackRecord::track(STATION_ID, 1535301120, "Simon Lewis", "Hey Jessy"),
            ]
        );
        assert_eq!(source.cursor().max_id.as_deref(), Some("3"));
        assert_eq!(requests.lock().unwrap()[0].max_id, None);
    }

    #[tokio::test]
    async fn test_next_skips_inclusive_cursor_tweet() {
        let (mut source, requests) = source();

        source.next_batch().await.unwrap();
        let records = source.next_batch().await.unwrap();

        assert_eq!(
            records,
            vec![
                TrackRecord::track(STATION_ID, 1535300700, "Harry Styles", "Sign of the Times"),
                TrackRecord::track(STATION_ID, 1535300520, "Alan Walker", "Faded"),
            ]
        );
        assert_eq!(requests.lock().unwrap()[1].max_id.as_deref(), Some("3"));
        assert_eq!(source.cursor().max_id.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_next_exhausted_feed_is_error() {
        let (mut source, _) = source();

        source.next_batch().await.unwrap();
        source.next_batch().await.unwrap();
        // Page for max_id=5 only repeats tweet 5
        let err = source.next_batch().await.unwrap_err();

        assert!(matches!(err, SourceError::NoRecords(1)));
        assert_eq!(source.cursor().max_id.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_next_upstream_error() {
        let api = PagedTimeline {
            requests: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        };
        let mut source = HitradioOe3Source::new(Box::new(api));

        assert!(source.next_batch().await.is_err());
        assert_eq!(source.cursor().max_id, None);
    }

    #[tokio::test]
    async fn test_next_request_limit() {
        let (mut source, requests) = source();
        source.cursor.fetch_counter = REQUEST_LIMIT;

        let err = source.next_batch().await.unwrap_err();

        assert!(matches!(err, SourceError::RequestLimitExceeded(REQUEST_LIMIT)));
        assert!(requests.lock().unwrap().is_empty());
    }
}
