//! Storage Layer
//!
//! Key-value persistence behind a small trait, plus the driver account
//! book (credentials and sleep log) built on top of it.

mod accounts;
mod store;

pub use accounts::{AccountBook, AccountError, ClockHour, Meridiem, SleepRecord};
pub use store::{JsonFileStore, KeyValueStore, Mapping, MemoryStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::SerializationError(e.to_string())
    }
}
