//! Face detection and landmark prediction collaborators

use crate::landmarks::LandmarkSet;
use crate::DmsError;
use camera_capture::GrayFrame;
use serde::{Deserialize, Serialize};

/// Face bounding box in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl FaceBbox {
    /// Corner coordinates (left, top, right, bottom), truncated to pixels
    pub fn corners(&self) -> (i32, i32, i32, i32) {
        (
            self.x as i32,
            self.y as i32,
            (self.x + self.width) as i32,
            (self.y + self.height) as i32,
        )
    }
}

/// Finds faces in a grayscale frame. An empty result means no face.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &GrayFrame) -> Result<Vec<FaceBbox>, DmsError>;
}

/// Regresses the 68 landmarks of one detected face
pub trait LandmarkPredictor: Send {
    fn predict(&mut self, frame: &GrayFrame, face: &FaceBbox) -> Result<LandmarkSet, DmsError>;
}
