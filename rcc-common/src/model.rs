//! Track record model
//!
//! A `TrackRecord` is one airing of one track on one station. Records are
//! immutable once built; every source maps its upstream items into this shape
//! before the crawler sees them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Record kind for a played track (the only kind emitted today)
pub const TRACK_TYPE: &str = "track";

/// Artist/title pair as stored by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Track {
    pub artist: String,
    pub title: String,
}

/// One "now playing" event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    /// Station the track aired on
    pub station_id: String,
    /// Airtime in epoch seconds; primary ordering key
    pub timestamp: i64,
    /// Record kind, currently always [`TRACK_TYPE`]
    #[serde(rename = "type")]
    pub kind: String,
    /// Artist and title
    pub track: Track,
}

impl TrackRecord {
    /// Build a track record of kind [`TRACK_TYPE`]
    pub fn track(
        station_id: impl Into<String>,
        timestamp: i64,
        artist: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp,
            kind: TRACK_TYPE.to_string(),
            track: Track {
                artist: artist.into(),
                title: title.into(),
            },
        }
    }

    pub fn artist(&self) -> &str {
        &self.track.artist
    }

    pub fn title(&self) -> &str {
        &self.track.title
    }
}

impl fmt::Display for TrackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} `{} - {}`",
            self.station_id, self.timestamp, self.track.artist, self.track.title
        )
    }
}
