//! Crawl reconciliation engine
//!
//! Drives one [`TrackSource`] backward in time and forwards every record that
//! is newer than the station's high-water mark to the [`Ledger`]. A run ends
//! when a batch reaches the mark ("caught up"), or when the source fails.
//!
//! # Admission
//! Records of a batch are examined newest first:
//! 1. `timestamp <= mark`: caught up, nothing from here on is persisted
//! 2. `timestamp - mark <= 10s`: caught up as well; the record is almost
//!    certainly the one the ledger already holds, reported with a shifted
//!    airtime by the upstream
//! 3. otherwise the record is persisted; a failed write is logged and skipped
//!
//! Records carrying another station id are never written: the mark only
//! describes this crawler's station.
//!
//! The mark is read once at construction and only raised after the loop,
//! since batches arrive newest first and raising it mid-run would end the
//! run before older missing records are reached.

pub mod dedup;

use crate::ledger::{Ledger, LedgerError};
use crate::sources::{SourceError, TrackSource};
use rcc_common::{time, TrackRecord};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub use dedup::{filter_duplicates, records_equal};

/// Records this close above the mark count as already persisted
pub const PROXIMITY_WINDOW_SECS: i64 = 10;

/// Crawl errors
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unable to fetch latest track record: {0}")]
    Ledger(#[source] LedgerError),

    #[error("Reference time error: {0}")]
    Time(#[from] rcc_common::Error),

    /// Source failed; records persisted before the failure stay persisted
    #[error("Source {source_name} failed after {persisted} persisted records: {error}")]
    Source {
        source_name: &'static str,
        persisted: usize,
        #[source]
        error: SourceError,
    },

    /// Loop ended without reaching the mark and without a source error.
    /// Current sources always end in one of the two, so `run` never
    /// returns this today.
    #[error("crawler failed to update records ({persisted} persisted)")]
    NotCaughtUp { persisted: usize },
}

/// Result of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlReport {
    pub persisted: usize,
    pub caught_up: bool,
}

/// Result of admitting one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BatchOutcome {
    persisted: usize,
    caught_up: bool,
    newest_persisted: Option<i64>,
}

/// Reconciliation engine for one station
pub struct Crawler {
    station_id: String,
    source: Box<dyn TrackSource>,
    ledger: Arc<dyn Ledger>,
    high_water_mark: i64,
}

impl Crawler {
    /// Create a crawler, reading the station's high-water mark from the ledger
    ///
    /// When the ledger holds nothing for the station, the mark falls back to
    /// 23:59:59 of the previous day in the reference timezone. Any other
    /// ledger failure aborts construction.
    pub async fn new(
        station_id: impl Into<String>,
        source: Box<dyn TrackSource>,
        ledger: Arc<dyn Ledger>,
    ) -> Result<Self, CrawlError> {
        let station_id = station_id.into();
        if station_id.trim().is_empty() {
            return Err(CrawlError::InvalidParameter(
                "station id must not be empty".to_string(),
            ));
        }

        let high_water_mark = match ledger.latest_track_record(&station_id).await {
            Ok(latest) => {
                info!(station_id = %station_id, latest = %latest, "Latest track record loaded");
                latest.timestamp
            }
            Err(LedgerError::NoData) => {
                let fallback = time::previous_day_end(time::now())?;
                warn!(
                    station_id = %station_id,
                    high_water_mark = fallback,
                    "No track records in ledger, starting from end of previous day"
                );
                fallback
            }
            Err(e) => {
                error!(station_id = %station_id, error = %e, "Unable to fetch latest track record");
                return Err(CrawlError::Ledger(e));
            }
        };

        Ok(Self {
            station_id,
            source,
            ledger,
            high_water_mark,
        })
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    /// Timestamp of the newest record known to be persisted
    pub fn high_water_mark(&self) -> i64 {
        self.high_water_mark
    }

    /// Poll the source until caught up with the ledger
    pub async fn run(&mut self) -> Result<CrawlReport, CrawlError> {
        if time::now().timestamp() <= self.high_water_mark {
            info!(
                station_id = %self.station_id,
                high_water_mark = self.high_water_mark,
                "Crawler quit since latest track record is newer than current time"
            );
            return Ok(CrawlReport {
                persisted: 0,
                caught_up: true,
            });
        }

        info!(
            station_id = %self.station_id,
            source = self.source.name(),
            high_water_mark = self.high_water_mark,
            "Crawl started"
        );

        let mut persisted = 0;
        let mut caught_up = false;
        let mut newest_persisted: Option<i64> = None;
        let mut source_error = None;

        while !caught_up {
            let records = match self.source.next_batch().await {
                Ok(records) => records,
                Err(e) => {
                    source_error = Some(e);
                    break;
                }
            };

            let records = filter_duplicates(records, self.high_water_mark);
            let outcome = self.persist_batch(&records).await;

            persisted += outcome.persisted;
            caught_up = outcome.caught_up;
            newest_persisted = newest_persisted.max(outcome.newest_persisted);
        }

        if let Some(newest) = newest_persisted {
            self.high_water_mark = self.high_water_mark.max(newest);
        }

        info!(station_id = %self.station_id, persisted, "Track records persisted");

        if let Some(error) = source_error {
            warn!(station_id = %self.station_id, error = %error, "Crawler finished with error");
            return Err(CrawlError::Source {
                source_name: self.source.name(),
                persisted,
                error,
            });
        }

        if !caught_up {
            warn!(station_id = %self.station_id, "Crawler failed to update records");
            return Err(CrawlError::NotCaughtUp { persisted });
        }

        info!(station_id = %self.station_id, "Crawler successfully updated records");
        Ok(CrawlReport {
            persisted,
            caught_up,
        })
    }

    /// Admit one newest-first batch against the current mark
    async fn persist_batch(&self, records: &[TrackRecord]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for record in records {
            if record.station_id != self.station_id {
                error!(
                    station_id = %self.station_id,
                    record = %record,
                    "Track record belongs to another station, not persisted"
                );
                continue;
            }

            if record.timestamp <= self.high_water_mark {
                debug!(record = %record, "Reached high-water mark");
                outcome.caught_up = true;
                return outcome;
            }

            if record.timestamp - self.high_water_mark <= PROXIMITY_WINDOW_SECS {
                warn!(
                    high_water_mark = self.high_water_mark,
                    record = %record,
                    "Track record close to high-water mark but not equal, finishing"
                );
                outcome.caught_up = true;
                return outcome;
            }

            if let Err(e) = self.ledger.persist_track_record(record).await {
                error!(record = %record, error = %e, "Unable to persist track record");
                continue;
            }

            outcome.persisted += 1;
            outcome.newest_persisted = outcome.newest_persisted.max(Some(record.timestamp));
        }

        outcome
    }
}
