//! Drowsiness Monitor
//!
//! Wires frame acquisition, per-frame driver analysis, the alert state
//! machine and telemetry rendering into one cancellable session loop.

pub mod cli;
pub mod metrics;
pub mod orchestrator;
pub mod render;
pub mod replay;
pub mod session;
pub mod settings;

pub use cli::{Cli, Command};
pub use orchestrator::{Collaborators, ExitReason, FrameLoop, SessionSummary};
pub use render::{JsonLinesSink, OverlayWriter, TelemetrySink};
pub use replay::AnnotationReplay;
pub use session::{SessionSignal, SessionSupervisor};
pub use settings::{LoggingSettings, MonitorSettings};

use alerting::AlertError;
use camera_capture::CameraError;
use dms::DmsError;
use storage::{AccountError, StorageError};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Video source error: {0}")]
    VideoSource(#[from] CameraError),

    #[error(transparent)]
    Dms(#[from] DmsError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Annotation error: {0}")]
    Annotation(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize logging
pub fn init_logging(settings: &LoggingSettings) -> Result<(), MonitorError> {
    let level: Level = settings
        .level
        .parse()
        .map_err(|_| MonitorError::Logging(format!("unknown log level {:?}", settings.level)))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if settings.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    result.map_err(|e| MonitorError::Logging(e.to_string()))
}
