//! Error types for glycemic grading

use chrono::NaiveTime;
use thiserror::Error;

/// Errors that can occur while grading a glucose series
#[derive(Debug, Error)]
pub enum GradeError {
    #[error("No glucose readings available for grading")]
    EmptySeries,

    #[error("Grading table has no rule covering final score {0}")]
    GradingTableGap(u32),

    #[error("Lookback window of {0} hours reaches past the earliest supported date")]
    InvalidWindow(u32),

    #[error("Invalid grading table: {0}")]
    InvalidGradingTable(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Errors raised by a time-series store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Slot time {0} is not aligned to a 15-minute boundary")]
    MisalignedSlot(NaiveTime),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store snapshot: {0}")]
    Snapshot(String),
}
