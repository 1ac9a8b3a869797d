//! Per-frame drowsiness conditions

use serde::{Deserialize, Serialize};

/// Eye aspect ratio below which the eyes count as closed
pub const EAR_THRESH: f64 = 0.25;

/// Mouth aspect ratio above which the mouth counts as yawning
pub const MAR_THRESH: f64 = 0.79;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    pub ear: f64,
    pub mar: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            ear: EAR_THRESH,
            mar: MAR_THRESH,
        }
    }
}

/// Conditions observed in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalConditions {
    pub face_absent: bool,
    pub eyes_closed: bool,
    pub yawning: bool,
}

impl SignalConditions {
    /// Frame with no detected face
    pub fn no_face() -> Self {
        Self {
            face_absent: true,
            ..Default::default()
        }
    }

    pub fn any(&self) -> bool {
        self.face_absent || self.eyes_closed || self.yawning
    }
}

/// Threshold comparison for the last evaluated face
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalGate {
    thresholds: SignalThresholds,
}

impl SignalGate {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> SignalThresholds {
        self.thresholds
    }

    /// Strict comparisons; NaN ratios never trigger a condition
    pub fn evaluate(&self, face_count: usize, ear: f64, mar: f64) -> SignalConditions {
        if face_count == 0 {
            return SignalConditions::no_face();
        }
        SignalConditions {
            face_absent: false,
            eyes_closed: ear < self.thresholds.ear,
            yawning: mar > self.thresholds.mar,
        }
    }
}
