//! Layered monitor settings: serde defaults, optional TOML file, `DROWSY__*` environment

use crate::MonitorError;
use alerting::AlertTiming;
use camera_capture::CameraConfig;
use config::{Config, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment prefix, e.g. `DROWSY__DMS__EAR_THRESHOLD=0.22`
pub const ENV_PREFIX: &str = "DROWSY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// JSON-lines face annotations keyed by frame sequence
    pub annotations: PathBuf,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            annotations: PathBuf::from("annotations.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Alert sound (RIFF/WAVE)
    pub alert_sound: PathBuf,
    /// JSON-lines telemetry file; stdout when unset
    pub telemetry: Option<PathBuf>,
    /// Directory for annotated frames; disabled when unset
    pub overlay_dir: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            alert_sound: PathBuf::from("default_alert.wav"),
            telemetry: None,
            overlay_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub users: PathBuf,
    pub sleep_data: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            users: PathBuf::from("users.json"),
            sleep_data: PathBuf::from("sleep_data.json"),
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub dms: DmsConfig,
    pub alert: AlertTiming,
    pub capture: CameraConfig,
    pub replay: ReplaySettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
}

impl MonitorSettings {
    /// Load settings, layering the file (if given and present) and the environment over defaults
    pub fn load(file: Option<&Path>) -> Result<Self, MonitorError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            debug!("Reading settings from {}", path.display());
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings: MonitorSettings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        self.dms.validate()?;
        self.alert.eyes_closed_threshold()?;
        self.alert.auto_stop()?;
        if self.capture.canonical_width == 0 {
            return Err(MonitorError::Session("capture.canonical_width must be positive".into()));
        }
        Ok(())
    }
}
