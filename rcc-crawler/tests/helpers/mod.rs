//! Test Helper Utilities
//!
//! In-memory ledger and upstream doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rcc_common::TrackRecord;
use rcc_crawler::ledger::{Ledger, LedgerError};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Ledger keeping records per station, keyed by timestamp like the real PUT
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<BTreeMap<(String, i64), TrackRecord>>,
    writes: Mutex<usize>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger already holding `records`
    pub fn seeded(records: Vec<TrackRecord>) -> Self {
        let ledger = Self::new();
        {
            let mut stored = ledger.records.lock().unwrap();
            for record in records {
                stored.insert((record.station_id.clone(), record.timestamp), record);
            }
        }
        ledger
    }

    /// Records of `station_id`, newest first
    pub fn records(&self, station_id: &str) -> Vec<TrackRecord> {
        self.records
            .lock()
            .unwrap()
            .values()
            .rev()
            .filter(|r| r.station_id == station_id)
            .cloned()
            .collect()
    }

    /// Number of persist calls, including overwrites
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn latest_track_record(&self, station_id: &str) -> Result<TrackRecord, LedgerError> {
        self.records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.station_id == station_id)
            .max_by_key(|r| r.timestamp)
            .cloned()
            .ok_or(LedgerError::NoData)
    }

    async fn persist_track_record(&self, record: &TrackRecord) -> Result<(), LedgerError> {
        *self.writes.lock().unwrap() += 1;
        self.records
            .lock()
            .unwrap()
            .insert((record.station_id.clone(), record.timestamp), record.clone());
        Ok(())
    }
}

pub fn record(station_id: &str, timestamp: i64, artist: &str, title: &str) -> TrackRecord {
    TrackRecord::track(station_id, timestamp, artist, title)
}
