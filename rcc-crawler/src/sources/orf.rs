//! ORF regional station source
//!
//! Every ORF station publishes its recent playlist as one JSON document of
//! `{"playedat": <unix seconds>, "title": "<a> - <b>"}` items. There is no
//! paging, so the source is single shot: the first call returns whatever the
//! snapshot holds and any further call in the same run fails.
//!
//! Stations differ in whether `title` reads "title - artist" or
//! "artist - title", and in which station jingles have to be filtered out.
//! Both are captured in a static [`StationConfig`] table.

use super::{skip_rate, SourceError, TrackSource};
use crate::http::HttpGet;
use async_trait::async_trait;
use rcc_common::TrackRecord;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Maximum snapshot requests per crawl run
pub const REQUEST_LIMIT: u32 = 1;

const TITLE_SEPARATOR: &str = " - ";

/// One snapshot entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrfItem {
    #[serde(rename = "playedat", alias = "playedAt", alias = "PlayedAt")]
    pub played_at: i64,
    #[serde(alias = "Title")]
    pub title: String,
}

impl OrfItem {
    pub fn new(played_at: i64, title: &str) -> Self {
        Self {
            played_at,
            title: title.to_string(),
        }
    }

    /// Split `title` into a record; anything but exactly two parts is rejected
    pub fn to_track_record(&self, config: &StationConfig) -> Result<TrackRecord, SourceError> {
        let parts: Vec<&str> = self.title.split(TITLE_SEPARATOR).collect();
        let (first, second) = match parts.as_slice() {
            [first, second] => (*first, *second),
            _ => {
                return Err(SourceError::Decode(
                    "could not extract title and artist".to_string(),
                ))
            }
        };

        let (artist, title) = match config.order {
            TitleOrder::TitleDashArtist => (second, first),
            TitleOrder::ArtistDashTitle => (first, second),
        };
        Ok(TrackRecord::track(config.station_id, self.played_at, artist, title))
    }
}

/// Layout of the combined `title` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleOrder {
    TitleDashArtist,
    ArtistDashTitle,
}

/// Per-station filter for jingles and programme announcements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipRule {
    /// Station publishes no usable tracks at the moment
    Everything,
    Nothing,
    TitleEquals(&'static str),
    ArtistEquals(&'static str),
}

impl SkipRule {
    /// Whether `record` has to be dropped
    pub fn applies(&self, record: &TrackRecord) -> bool {
        match self {
            SkipRule::Everything => true,
            SkipRule::Nothing => false,
            SkipRule::TitleEquals(title) => record.title() == *title,
            SkipRule::ArtistEquals(artist) => record.artist() == *artist,
        }
    }
}

/// Immutable per-station settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationConfig {
    /// Lookup key, may contain umlauts
    pub key: &'static str,
    /// Ledger station id
    pub station_id: &'static str,
    /// Host code in `mp3<code>.apasf.sf.apa.at`
    pub url_code: &'static str,
    pub order: TitleOrder,
    pub skip: SkipRule,
}

impl StationConfig {
    pub fn fetch_url(&self) -> String {
        format!(
            "http://mp3{}.apasf.sf.apa.at/played.html?type=json",
            self.url_code
        )
    }
}

pub const STATIONS: &[StationConfig] = &[
    StationConfig {
        key: "radio-oe1",
        station_id: "radio-oe1",
        url_code: "ooe1",
        order: TitleOrder::ArtistDashTitle,
        // Programme announcements only, e.g. "Jetzt in Ö1: ..."
        skip: SkipRule::Everything,
    },
    StationConfig {
        key: "hitradio-oe3",
        station_id: "hitradio-oe3",
        url_code: "oe3",
        order: TitleOrder::ArtistDashTitle,
        skip: SkipRule::ArtistEquals("Hitradio Ö3"),
    },
    StationConfig {
        key: "radio-burgenland",
        station_id: "radio-burgenland",
        url_code: "burgenland",
        order: TitleOrder::TitleDashArtist,
        skip: SkipRule::TitleEquals("Radio Burgenland"),
    },
    StationConfig {
        key: "radio-kärnten",
        station_id: "radio-kaernten",
        url_code: "kaernten",
        order: TitleOrder::TitleDashArtist,
        skip: SkipRule::TitleEquals("Radio Kärnten"),
    },
    StationConfig {
        key: "radio-niederösterreich",
        station_id: "radio-niederoesterreich",
        url_code: "noe",
        order: TitleOrder::TitleDashArtist,
        // Jingles carry no separator and fail to split anyway
        skip: SkipRule::Nothing,
    },
    StationConfig {
        key: "radio-oberösterreich",
        station_id: "radio-oberoesterreich",
        url_code: "ooe",
        order: TitleOrder::TitleDashArtist,
        skip: SkipRule::TitleEquals("RADIO OÖ"),
    },
    StationConfig {
        key: "radio-salzburg",
        station_id: "radio-salzburg",
        url_code: "salzburg",
        order: TitleOrder::TitleDashArtist,
        skip: SkipRule::Everything,
    },
    StationConfig {
        key: "radio-tirol",
        station_id: "radio-tirol",
        url_code: "tirol",
        order: TitleOrder::TitleDashArtist,
        skip: SkipRule::Everything,
    },
    StationConfig {
        key: "radio-vorarlberg",
        station_id: "radio-vorarlberg",
        url_code: "vlbg",
        order: TitleOrder::TitleDashArtist,
        skip: SkipRule::Everything,
    },
    StationConfig {
        key: "radio-wien",
        station_id: "radio-wien",
        url_code: "wien2",
        order: TitleOrder::TitleDashArtist,
        skip: SkipRule::Everything,
    },
];

/// Look up a station by key or by ledger station id
pub fn find_station_config(key: &str) -> Result<&'static StationConfig, SourceError> {
    STATIONS
        .iter()
        .find(|config| config.key == key || config.station_id == key)
        .ok_or_else(|| SourceError::Config(format!("unsupported station: {}", key)))
}

/// Map snapshot items to records, dropping unsplittable and skipped entries
pub fn to_track_records(items: &[OrfItem], config: &StationConfig) -> Vec<TrackRecord> {
    items
        .iter()
        .filter_map(|item| match item.to_track_record(config) {
            Ok(record) if config.skip.applies(&record) => {
                info!(title = %item.title, airtime = item.played_at, "Skipping item");
                None
            }
            Ok(record) => Some(record),
            Err(e) => {
                error!(title = %item.title, error = %e, "Unable to extract track record from item");
                None
            }
        })
        .collect()
}

/// Snapshot lookup
#[async_trait]
pub trait OrfApi: Send + Sync {
    async fn get_items(&self) -> Result<Vec<OrfItem>, SourceError>;
}

/// HTTP implementation of [`OrfApi`] for one station endpoint
pub struct OrfHttpApi {
    http: Arc<dyn HttpGet>,
    endpoint: String,
}

impl OrfHttpApi {
    pub fn new(http: Arc<dyn HttpGet>, endpoint: String) -> Self {
        Self { http, endpoint }
    }
}

#[async_trait]
impl OrfApi for OrfHttpApi {
    async fn get_items(&self) -> Result<Vec<OrfItem>, SourceError> {
        let body = self.http.get(&self.endpoint).await?;

        serde_json::from_slice(&body).map_err(|e| {
            error!(url = %self.endpoint, error = %e, "Unmarshalling ORF response failed");
            SourceError::Decode(e.to_string())
        })
    }
}

/// Snapshot source for one ORF station
pub struct OrfSource {
    api: Box<dyn OrfApi>,
    config: &'static StationConfig,
    fetch_counter: u32,
}

impl OrfSource {
    pub fn new(api: Box<dyn OrfApi>, config: &'static StationConfig) -> Self {
        Self {
            api,
            config,
            fetch_counter: 0,
        }
    }

    /// Source for the station behind `key`, fetching over `http`
    pub fn for_station(http: Arc<dyn HttpGet>, key: &str) -> Result<Self, SourceError> {
        let config = find_station_config(key)?;
        let api = OrfHttpApi::new(http, config.fetch_url());
        Ok(Self::new(Box::new(api), config))
    }

    pub fn station_id(&self) -> &'static str {
        self.config.station_id
    }
}

#[async_trait]
impl TrackSource for OrfSource {
    fn name(&self) -> &'static str {
        "orf"
    }

    async fn next_batch(&mut self) -> Result<Vec<TrackRecord>, SourceError> {
        if self.fetch_counter >= REQUEST_LIMIT {
            return Err(SourceError::AlreadyFetched);
        }

        let items = self.api.get_items().await.map_err(|e| {
            error!(
                station_id = self.config.station_id,
                error = %e,
                "Unable to fetch items from ORF"
            );
            e
        })?;

        info!(
            station_id = self.config.station_id,
            count = items.len(),
            "Fetched items from ORF"
        );

        let mut records = to_track_records(&items, self.config);
        if records.is_empty() {
            warn!(
                items = items.len(),
                skip_rate_pct = skip_rate(0, items.len()),
                "Unable to extract any track records"
            );
            return Err(SourceError::NoRecords(items.len()));
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.fetch_counter += 1;

        info!(
            records = records.len(),
            items = items.len(),
            skip_rate_pct = skip_rate(records.len(), items.len()),
            "Returned track records"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpError;

    const OOE: &str = "radio-oberoesterreich";

    fn snapshot() -> Vec<OrfItem> {
        vec![
            OrfItem::new(1539532794, "RADIO OÖ - MEIN LAND. MEIN RADIO"),
            OrfItem::new(1539532528, "NOTHING'S GONNA STOP US NOW - STARSHIP"),
            OrfItem::new(1539532508, "RADIO OÖ - MEIN LAND. MEIN RADIO"),
            OrfItem::new(1539532242, "LOVE CHANGES EVERYTHING - CLIMIE FISHER"),
            OrfItem::new(1539531997, "RADIO OÖ - MEIN LAND. MEIN RADIO"),
            OrfItem::new(1539531786, "DIE WELT (live) - AUSTRIA 3"),
            OrfItem::new(1539531595, "DREAMIN' - CLIFF RICHARD"),
            OrfItem::new(1539531375, "DO THE LIMBO DANCE - DAVID HASSELHOFF"),
            OrfItem::new(1539530999, "RADIO OÖ - MEIN LAND. MEIN RADIO"),
            OrfItem::new(1539530784, "TU'S DOCH TU'S - FRANCINE JORDI"),
            OrfItem::new(1539530769, "RADIO OÖ - MEIN LAND. MEIN RADIO"),
            OrfItem::new(1539530543, "L' ITALIANO - TOTO CUTUGNO"),
            OrfItem::new(1539530292, "KANSAS CITY - LES HUMPHRIES SINGERS"),
            OrfItem::new(1539530187, "RADIO OÖ - MEIN LAND. MEIN RADIO"),
            OrfItem::new(1539530006, "BLUE NIGHT SHADOW - TWO OF US"),
            OrfItem::new(1539530001, "RADIO OÖ - MEIN LAND. MEIN RADIO"),
            OrfItem::new(1539529791, "MANCHMAL DENK I NO AN DI - RAINHARD FENDRICH"),
            OrfItem::new(1539529565, "LOVE TOUCH - ROD STEWART"),
            OrfItem::new(1539529189, "RADIO OÖ - MEIN LAND. MEIN RADIO"),
            OrfItem::new(1539529034, "A SUMMER SONG - CHAD & JEREMY"),
        ]
    }

    fn expected_records() -> Vec<TrackRecord> {
        [
            (1539532528, "STARSHIP", "NOTHING'S GONNA STOP US NOW"),
            (1539532242, "CLIMIE FISHER", "LOVE CHANGES EVERYTHING"),
            (1539531786, "AUSTRIA 3", "DIE WELT (live)"),
            (1539531595, "CLIFF RICHARD", "DREAMIN'"),
            (1539531375, "DAVID HASSELHOFF", "DO THE LIMBO DANCE"),
            (1539530784, "FRANCINE JORDI", "TU'S DOCH TU'S"),
            (1539530543, "TOTO CUTUGNO", "L' ITALIANO"),
            (1539530292, "LES HUMPHRIES SINGERS", "KANSAS CITY"),
            (1539530006, "TWO OF US", "BLUE NIGHT SHADOW"),
            (1539529791, "RAINHARD FENDRICH", "MANCHMAL DENK I NO AN DI"),
            (1539529565, "ROD STEWART", "LOVE TOUCH"),
            (1539529034, "CHAD & JEREMY", "A SUMMER SONG"),
        ]
        .iter()
        .map(|(ts, artist, title)| TrackRecord::track(OOE, *ts, *artist, *title))
        .collect()
    }

    struct SnapshotApi(Vec<OrfItem>);

    #[async_trait]
    impl OrfApi for SnapshotApi {
        async fn get_items(&self) -> Result<Vec<OrfItem>, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct FixedBody(&'static str);

    #[async_trait]
    impl HttpGet for FixedBody {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, HttpError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    fn ooe_source(items: Vec<OrfItem>) -> OrfSource {
        let config = find_station_config("radio-oberösterreich").unwrap();
        OrfSource::new(Box::new(SnapshotApi(items)), config)
    }

    #[tokio::test]
    async fn test_http_api_decodes_lowercase_keys() {
        let body = r#"[{"playedat": 1539532794,"title": "RADIO OÖ - MEIN LAND. MEIN RADIO","metadata": {"tit2": "RADIO OÖ - MEIN LAND. MEIN RADIO"}},
            {"playedat": 1539532528,"title": "NOTHING'S GONNA STOP US NOW - STARSHIP","metadata": {"tit2": "NOTHING'S GONNA STOP US NOW - STARSHIP"}}]"#;
        let api = OrfHttpApi::new(Arc::new(FixedBody(body)), "localhost".to_string());

        let items = api.get_items().await.unwrap();

        assert_eq!(items, snapshot()[..2].to_vec());
    }

    #[tokio::test]
    async fn test_http_api_rejects_garbage() {
        let api = OrfHttpApi::new(Arc::new(FixedBody("<html/>")), "localhost".to_string());
        assert!(matches!(api.get_items().await, Err(SourceError::Decode(_))));
    }

    #[tokio::test]
    async fn test_next_extracts_and_skips_jingles() {
        let mut source = ooe_source(snapshot());

        let records = source.next_batch().await.unwrap();

        assert_eq!(records, expected_records());
    }

    #[tokio::test]
    async fn test_next_is_single_shot() {
        let mut source = ooe_source(snapshot());

        source.next_batch().await.unwrap();
        let err = source.next_batch().await.unwrap_err();

        assert!(matches!(err, SourceError::AlreadyFetched));
    }

    #[tokio::test]
    async fn test_next_nothing_extractable() {
        let mut source = ooe_source(vec![
            OrfItem::new(1539532794, "RADIO OÖ - MEIN LAND. MEIN RADIO"),
            OrfItem::new(1539532508, "DIE GROESSTEN HITS"),
        ]);

        let err = source.next_batch().await.unwrap_err();
        assert!(matches!(err, SourceError::NoRecords(2)));
    }

    #[test]
    fn test_title_split() {
        let ooe = find_station_config(OOE).unwrap();
        let oe3 = find_station_config("hitradio-oe3").unwrap();
        let item = OrfItem::new(1, "A - B");

        let record = item.to_track_record(ooe).unwrap();
        assert_eq!((record.artist(), record.title()), ("B", "A"));

        let record = item.to_track_record(oe3).unwrap();
        assert_eq!((record.artist(), record.title()), ("A", "B"));

        assert!(OrfItem::new(1, "no separator").to_track_record(ooe).is_err());
        assert!(OrfItem::new(1, "a - b - c").to_track_record(ooe).is_err());
    }

    #[test]
    fn test_skip_rules() {
        let record = TrackRecord::track("s", 1, "Hitradio Ö3", "LiveStream");

        assert!(SkipRule::Everything.applies(&record));
        assert!(!SkipRule::Nothing.applies(&record));
        assert!(SkipRule::ArtistEquals("Hitradio Ö3").applies(&record));
        assert!(!SkipRule::TitleEquals("Hitradio Ö3").applies(&record));
        assert!(SkipRule::TitleEquals("LiveStream").applies(&record));
    }

    #[test]
    fn test_find_station_config_urls() {
        let urls = [
            ("radio-oe1", "http://mp3ooe1.apasf.sf.apa.at/played.html?type=json"),
            ("hitradio-oe3", "http://mp3oe3.apasf.sf.apa.at/played.html?type=json"),
            ("radio-burgenland", "http://mp3burgenland.apasf.sf.apa.at/played.html?type=json"),
            ("radio-kärnten", "http://mp3kaernten.apasf.sf.apa.at/played.html?type=json"),
            ("radio-niederösterreich", "http://mp3noe.apasf.sf.apa.at/played.html?type=json"),
            ("radio-oberösterreich", "http://mp3ooe.apasf.sf.apa.at/played.html?type=json"),
            ("radio-salzburg", "http://mp3salzburg.apasf.sf.apa.at/played.html?type=json"),
            ("radio-tirol", "http://mp3tirol.apasf.sf.apa.at/played.html?type=json"),
            ("radio-vorarlberg", "http://mp3vlbg.apasf.sf.apa.at/played.html?type=json"),
            ("radio-wien", "http://mp3wien2.apasf.sf.apa.at/played.html?type=json"),
        ];

        for (key, url) in urls {
            assert_eq!(find_station_config(key).unwrap().fetch_url(), url, "{}", key);
        }
        assert!(find_station_config("not-found").is_err());
    }

    #[test]
    fn test_find_station_config_by_station_id() {
        let by_key = find_station_config("radio-kärnten").unwrap();
        let by_id = find_station_config("radio-kaernten").unwrap();
        assert_eq!(by_key, by_id);
        assert_eq!(by_id.station_id, "radio-kaernten");
    }
}
