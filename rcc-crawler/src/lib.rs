//! rcc-crawler library interface
//!
//! Reconciles radio "now playing" data from upstream station endpoints with
//! the ledger. Exposes the engine, sources and clients for integration
//! testing and for the `rcc-crawler` binary.

pub mod config;
pub mod crawler;
pub mod http;
pub mod ledger;
pub mod sources;

pub use crate::crawler::{CrawlError, CrawlReport, Crawler};
pub use crate::ledger::{HomeBaseConnector, Ledger, LedgerError};
pub use crate::sources::{SourceError, TrackSource};
