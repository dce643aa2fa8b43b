//! # RCC Common Library
//!
//! Shared code for the radio crawler workspace including:
//! - Track record model (the unit forwarded to the ledger)
//! - Error types
//! - Bootstrap configuration loading
//! - Reference-timezone helpers (all station clocks run on Vienna time)

pub mod config;
pub mod error;
pub mod model;
pub mod time;

pub use error::{Error, Result};
pub use model::{Track, TrackRecord};
