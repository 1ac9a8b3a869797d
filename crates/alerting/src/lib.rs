//! Alerting System
//!
//! Drives the drowsiness alert from per-frame signal conditions and
//! applies the resulting play/stop effects to an audio sink.

mod audio;
mod machine;

pub use audio::{AlertPlayer, AudioSink, LogSink, RecordingSink, SinkEvent, SoundAsset};
pub use machine::{
    AlertEffect, AlertKind, AlertPhase, AlertState, AlertStateMachine, AlertTiming, ALERTS_TRIGGERED_TOTAL,
};

use std::path::PathBuf;
use thiserror::Error;

/// Alerting error types
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Failed to load alert sound {path}: {reason}")]
    AssetLoad { path: PathBuf, reason: String },

    #[error("Audio playback failed: {0}")]
    Playback(String),

    #[error("Invalid alert timing: {0}")]
    InvalidTiming(String),
}
