//! Facial landmark model (dlib 68-point layout)

use crate::DmsError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Number of points produced by the landmark predictor
pub const NUM_LANDMARKS: usize = 68;

/// Landmark indices of the six pose correspondences, in pose model order:
/// nose tip, chin, left eye outer corner, right eye outer corner,
/// left mouth corner, right mouth corner
pub const POSE_LANDMARK_INDICES: [usize; 6] = [30, 8, 36, 45, 48, 54];

/// Image-space point in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Pixel coordinates, truncated toward zero
    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

/// Named sub-ranges of the 68-point layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacialRegion {
    Jaw,
    RightEyebrow,
    LeftEyebrow,
    Nose,
    RightEye,
    LeftEye,
    Mouth,
    InnerMouth,
}

impl FacialRegion {
    /// Index range of the region
    pub fn range(self) -> Range<usize> {
        match self {
            FacialRegion::Jaw => 0..17,
            FacialRegion::RightEyebrow => 17..22,
            FacialRegion::LeftEyebrow => 22..27,
            FacialRegion::Nose => 27..36,
            FacialRegion::RightEye => 36..42,
            FacialRegion::LeftEye => 42..48,
            FacialRegion::Mouth => 48..68,
            FacialRegion::InnerMouth => 60..68,
        }
    }
}

/// One face's landmarks, fixed length and ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point2>", into = "Vec<Point2>")]
pub struct LandmarkSet {
    points: Vec<Point2>,
}

impl LandmarkSet {
    /// Validate and wrap predictor output
    pub fn new(points: Vec<Point2>) -> Result<Self, DmsError> {
        if points.len() != NUM_LANDMARKS {
            return Err(DmsError::InvalidLandmarks(format!(
                "expected {} points, got {}",
                NUM_LANDMARKS,
                points.len()
            )));
        }
        if let Some(idx) = points.iter().position(|p| !p.is_finite()) {
            return Err(DmsError::InvalidLandmarks(format!("point {} is not finite", idx)));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    /// Points of a named region
    pub fn region(&self, region: FacialRegion) -> &[Point2] {
        &self.points[region.range()]
    }

    /// Arbitrary index range; `None` when out of bounds
    pub fn span(&self, range: Range<usize>) -> Option<&[Point2]> {
        self.points.get(range)
    }

    /// The six correspondences for head pose estimation
    pub fn pose_points(&self) -> [Point2; 6] {
        POSE_LANDMARK_INDICES.map(|idx| self.points[idx])
    }
}

impl TryFrom<Vec<Point2>> for LandmarkSet {
    type Error = DmsError;

    fn try_from(points: Vec<Point2>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<LandmarkSet> for Vec<Point2> {
    fn from(set: LandmarkSet) -> Self {
        set.points
    }
}
