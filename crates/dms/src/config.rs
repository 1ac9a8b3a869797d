//! DMS configuration

use crate::pnp::SolverSettings;
use crate::signal::{SignalThresholds, EAR_THRESH, MAR_THRESH};
use crate::DmsError;
use serde::{Deserialize, Serialize};

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Eye aspect ratio below which the eyes count as closed
    pub ear_threshold: f64,

    /// Mouth aspect ratio above which the mouth counts as yawning
    pub mar_threshold: f64,

    /// Enable head pose estimation
    pub enable_pose: bool,

    /// Levenberg-Marquardt iteration budget for the PnP refinement
    pub max_solver_iterations: usize,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: EAR_THRESH,
            mar_threshold: MAR_THRESH,
            enable_pose: true,
            max_solver_iterations: SolverSettings::default().max_iterations,
        }
    }
}

impl DmsConfig {
    /// Thresholds handed to the signal gate
    pub fn thresholds(&self) -> SignalThresholds {
        SignalThresholds {
            ear: self.ear_threshold,
            mar: self.mar_threshold,
        }
    }

    /// Solver settings handed to the pose estimator
    pub fn solver(&self) -> SolverSettings {
        SolverSettings {
            max_iterations: self.max_solver_iterations,
            ..Default::default()
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), DmsError> {
        if !(self.ear_threshold > 0.0 && self.ear_threshold < 1.0) {
            return Err(DmsError::Config(format!(
                "ear_threshold must be in (0, 1), got {}",
                self.ear_threshold
            )));
        }
        if !(self.mar_threshold > 0.0 && self.mar_threshold.is_finite()) {
            return Err(DmsError::Config(format!(
                "mar_threshold must be positive, got {}",
                self.mar_threshold
            )));
        }
        if self.max_solver_iterations == 0 {
            return Err(DmsError::Config("max_solver_iterations must be at least 1".into()));
        }
        Ok(())
    }
}
