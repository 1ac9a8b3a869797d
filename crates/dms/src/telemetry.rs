//! Per-frame telemetry handed to renderers

use crate::detector::FaceBbox;
use crate::landmarks::LandmarkSet;
use crate::pose::PoseEstimate;
use chrono::{DateTime, Local, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock label format
pub const TIMESTAMP_FORMAT: &str = "%d %b %Y %I:%M:%S %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_time(time: NaiveTime) -> Self {
        match time.hour() {
            h if h < 12 => TimeOfDay::Morning,
            h if h < 17 => TimeOfDay::Afternoon,
            h if h < 20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeOfDay::Morning => "Morning",
            TimeOfDay::Afternoon => "Afternoon",
            TimeOfDay::Evening => "Evening",
            TimeOfDay::Night => "Night",
        };
        f.write_str(label)
    }
}

/// Alert banner shown on the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLabel {
    NoFace,
    EyesClosed,
    Yawning,
}

impl AlertLabel {
    pub fn text(&self) -> &'static str {
        match self {
            AlertLabel::NoFace => "No Face Detected",
            AlertLabel::EyesClosed => "Eyes Closed!",
            AlertLabel::Yawning => "Yawning!",
        }
    }
}

impl fmt::Display for AlertLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Head direction line in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseOverlay {
    pub tilt_degrees: f64,
    pub start: (i32, i32),
    pub end: (i32, i32),
    pub end_alt: (i32, i32),
}

impl From<&PoseEstimate> for PoseOverlay {
    fn from(pose: &PoseEstimate) -> Self {
        Self {
            tilt_degrees: pose.tilt_degrees,
            start: pose.start_point.to_pixel(),
            end: pose.end_point.to_pixel(),
            end_alt: pose.end_point_alt.to_pixel(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceTelemetry {
    pub bbox: FaceBbox,
    /// Landmark markers in pixels
    pub landmarks: Vec<(i32, i32)>,
    pub ear: f64,
    pub mar: f64,
    /// Absent when the pose could not be estimated for this face
    pub pose: Option<PoseOverlay>,
}

impl FaceTelemetry {
    pub fn new(bbox: FaceBbox, landmarks: &LandmarkSet, ear: f64, mar: f64, pose: Option<&PoseEstimate>) -> Self {
        Self {
            bbox,
            landmarks: landmarks.points().iter().map(|p| p.to_pixel()).collect(),
            ear,
            mar,
            pose: pose.map(PoseOverlay::from),
        }
    }
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameTelemetry {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub faces: Vec<FaceTelemetry>,
    pub alert: Option<AlertLabel>,
    pub alert_playing: bool,
    pub beep_count: u32,
    pub timestamp: String,
    pub time_of_day: TimeOfDay,
}

impl FrameTelemetry {
    pub fn new(sequence: u64, width: u32, height: u32, now: DateTime<Local>) -> Self {
        Self {
            sequence,
            width,
            height,
            faces: Vec::new(),
            alert: None,
            alert_playing: false,
            beep_count: 0,
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            time_of_day: TimeOfDay::from_time(now.time()),
        }
    }

    pub fn has_alerts(&self) -> bool {
        self.alert.is_some()
    }
}
