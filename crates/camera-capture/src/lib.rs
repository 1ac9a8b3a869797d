//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides frame acquisition for the monitoring loop:
//! - `FrameSource` abstraction over live cameras and recorded sequences
//! - Scope-bound `Capture` handle that releases the source on drop
//! - Frame preprocessing (canonical resize, grayscale conversion)

pub mod frame;
pub mod sequence;
pub mod source;

pub use frame::{GrayFrame, VideoFrame};
pub use sequence::ImageSequenceSource;
pub use source::{Capture, FrameSource};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open frame source: {0}")]
    Open(String),

    #[error("Invalid frame: {0}")]
    Format(String),

    #[error("Unable to capture frame from the video stream")]
    NoFrame,

    #[error("Frame read failed: {0}")]
    Read(String),

    #[error("Frame source not initialized")]
    NotInitialized,
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Directory holding the recorded frame sequence
    pub device: PathBuf,
    /// Width every frame is resized to before detection
    pub canonical_width: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("frames"),
            canonical_width: 1024,
        }
    }
}
