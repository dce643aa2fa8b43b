//! Fuzzy duplicate filter
//!
//! Some upstreams list the same airing twice with slightly different
//! timestamps (e.g. a live version re-announced a minute later). Within one
//! newest-first batch, a record equal to the last kept record is dropped.

use rcc_common::TrackRecord;
use tracing::warn;

/// Records closer than this with identical track are the same airing
pub const DUPLICATE_WINDOW_SECS: i64 = 300;

/// Same artist and title, timestamps less than [`DUPLICATE_WINDOW_SECS`] apart
pub fn records_equal(a: &TrackRecord, b: &TrackRecord) -> bool {
    a.title() == b.title()
        && a.artist() == b.artist()
        && (a.timestamp - b.timestamp).abs() < DUPLICATE_WINDOW_SECS
}

/// Drop fuzzy duplicates from a newest-first batch
///
/// The first record is always kept and every later one is compared only with
/// the most recently kept record. Deduplication ends at the first record
/// older than `high_water_mark`; that record and everything after it are
/// passed through unchanged so admission can still see them.
pub fn filter_duplicates(records: Vec<TrackRecord>, high_water_mark: i64) -> Vec<TrackRecord> {
    let mut filtered: Vec<TrackRecord> = Vec::with_capacity(records.len());
    let mut deduplicating = true;

    for record in records {
        if record.timestamp < high_water_mark {
            deduplicating = false;
        }

        if deduplicating {
            if let Some(last) = filtered.last() {
                if records_equal(last, &record) {
                    warn!(record = %record, "Skipping duplicated track record");
                    continue;
                }
            }
        }
        filtered.push(record);
    }

    filtered
}
