//! Driver Monitoring System (DMS)
//!
//! Per-frame driver state analysis from facial landmarks:
//! - Head pose estimation (PnP solve, Rodrigues, Euler decomposition)
//! - Eye/mouth aspect ratios over the dlib 68-point layout
//! - Threshold gating of drowsiness signals
//! - Frame telemetry for overlays

pub mod config;
pub mod detector;
pub mod geometry;
pub mod landmarks;
pub mod pnp;
pub mod pose;
pub mod ratio;
pub mod signal;
pub mod telemetry;

pub use config::DmsConfig;
pub use detector::{FaceBbox, FaceDetector, LandmarkPredictor};
pub use geometry::EulerAngles;
pub use landmarks::{FacialRegion, LandmarkSet, Point2};
pub use pose::{CameraModel, HeadPoseEstimator, PoseEstimate, PoseModel};
pub use ratio::RatioFunctions;
pub use signal::{SignalConditions, SignalGate, SignalThresholds};
pub use telemetry::{AlertLabel, FaceTelemetry, FrameTelemetry, PoseOverlay, TimeOfDay};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Pose estimation failed: {0}")]
    PoseEstimationFailure(String),

    #[error("Rotation matrix failed the orthogonality check (deviation {deviation:.3e})")]
    NumericalInstability { deviation: f64 },

    #[error("Invalid landmarks: {0}")]
    InvalidLandmarks(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
