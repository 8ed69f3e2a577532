//! Test Helper Utilities
//!
//! Shared fixtures for wikifuse-engine integration tests

#![allow(dead_code)]

pub mod log_capture;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use wikifuse_common::FixedClock;
use wikifuse_engine::{FusionConfig, FusionCoordinator, Record};

pub use log_capture::{capture_logs, LogCapture};

/// Instant every test clock is pinned to
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn coordinator(config: FusionConfig) -> FusionCoordinator {
    FusionCoordinator::with_clock(config, Arc::new(FixedClock(test_now()))).unwrap()
}

pub fn record(value: Value) -> Record {
    Record::from_value(value)
}
