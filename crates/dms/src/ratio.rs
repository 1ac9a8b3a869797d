//! Eye and mouth aspect ratios
//!
//! The ratio functions are pluggable: the pipeline only relies on
//! `RatioFn` taking an ordered point subset and returning a scalar.

use crate::landmarks::{FacialRegion, LandmarkSet, Point2};
use std::ops::Range;

/// Ratio over an ordered point subset
pub type RatioFn = fn(&[Point2]) -> f64;

/// Mouth subset the default MAR formula is indexed against
pub const MAR_MOUTH_RANGE: Range<usize> = 49..68;

/// Eye aspect ratio over the six eye points.
///
/// Returns NaN for degenerate input (fewer than six points or zero eye width),
/// which the signal gate never reads as closed.
pub fn eye_aspect_ratio(eye: &[Point2]) -> f64 {
    if eye.len() < 6 {
        return f64::NAN;
    }
    let a = eye[1].distance(&eye[5]);
    let b = eye[2].distance(&eye[4]);
    let c = eye[0].distance(&eye[3]);
    if c <= f64::EPSILON {
        return f64::NAN;
    }
    (a + b) / (2.0 * c)
}

/// Mouth aspect ratio over the mouth subset starting at landmark 49.
///
/// Returns NaN for degenerate input.
pub fn mouth_aspect_ratio(mouth: &[Point2]) -> f64 {
    if mouth.len() < 11 {
        return f64::NAN;
    }
    let a = mouth[2].distance(&mouth[10]); // 51, 59
    let b = mouth[4].distance(&mouth[8]); // 53, 57
    let c = mouth[0].distance(&mouth[6]); // 49, 55
    if c <= f64::EPSILON {
        return f64::NAN;
    }
    (a + b) / (2.0 * c)
}

/// The ratio collaborators used by the frame loop
#[derive(Debug, Clone, Copy)]
pub struct RatioFunctions {
    pub eye: RatioFn,
    pub mouth: RatioFn,
}

impl Default for RatioFunctions {
    fn default() -> Self {
        Self {
            eye: eye_aspect_ratio,
            mouth: mouth_aspect_ratio,
        }
    }
}

impl RatioFunctions {
    /// Mean of the left and right eye ratios
    pub fn ear(&self, landmarks: &LandmarkSet) -> f64 {
        let left = (self.eye)(landmarks.region(FacialRegion::LeftEye));
        let right = (self.eye)(landmarks.region(FacialRegion::RightEye));
        (left + right) / 2.0
    }

    pub fn mar(&self, landmarks: &LandmarkSet) -> f64 {
        landmarks
            .span(MAR_MOUTH_RANGE)
            .map(|mouth| (self.mouth)(mouth))
            .unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::NUM_LANDMARKS;

    fn eye(openness: f64) -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, -openness),
            Point2::new(2.0, -openness),
            Point2::new(3.0, 0.0),
            Point2::new(2.0, openness),
            Point2::new(1.0, openness),
        ]
    }

    #[test]
    fn test_ear_open_and_closed() {
        // vertical 2*openness twice, horizontal 3
        assert!((eye_aspect_ratio(&eye(0.45)) - 0.3).abs() < 1e-12);
        assert!(eye_aspect_ratio(&eye(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_ear_degenerate() {
        assert!(eye_aspect_ratio(&eye(0.4)[..5]).is_nan());
        assert!(eye_aspect_ratio(&[Point2::default(); 6]).is_nan());
    }

    #[test]
    fn test_collapsed_landmarks_do_not_close_eyes() {
        let set = LandmarkSet::new(vec![Point2::new(5.0, 5.0); NUM_LANDMARKS]).unwrap();
        let ratios = RatioFunctions::default();
        let conditions = crate::SignalGate::default().evaluate(1, ratios.ear(&set), ratios.mar(&set));
        assert!(!conditions.eyes_closed);
        assert!(!conditions.yawning);
    }

    #[test]
    fn test_mar_formula() {
        let mut mouth = vec![Point2::default(); 19];
        mouth[0] = Point2::new(0.0, 0.0);
        mouth[6] = Point2::new(4.0, 0.0);
        mouth[2] = Point2::new(1.0, -2.0);
        mouth[10] = Point2::new(1.0, 2.0);
        mouth[4] = Point2::new(3.0, -1.0);
        mouth[8] = Point2::new(3.0, 1.0);
        // (4 + 2) / (2 * 4)
        assert!((mouth_aspect_ratio(&mouth) - 0.75).abs() < 1e-12);
        assert!(mouth_aspect_ratio(&mouth[..10]).is_nan());
    }

    #[test]
    fn test_functions_over_landmark_set() {
        let mut points = vec![Point2::new(0.0, 0.0); NUM_LANDMARKS];
        for (offset, p) in eye(0.45).into_iter().enumerate() {
            points[36 + offset] = p;
            points[42 + offset] = Point2::new(p.x + 10.0, p.y);
        }
        let set = LandmarkSet::new(points).unwrap();
        let ratios = RatioFunctions::default();
        assert!((ratios.ear(&set) - 0.3).abs() < 1e-12);
        assert!(ratios.mar(&set).is_nan());
    }

    #[test]
    fn test_custom_ratio_functions() {
        fn constant(_: &[Point2]) -> f64 {
            0.5
        }
        let ratios = RatioFunctions {
            eye: constant,
            mouth: constant,
        };
        let set = LandmarkSet::new(vec![Point2::default(); NUM_LANDMARKS]).unwrap();
        assert_eq!(ratios.ear(&set), 0.5);
        assert_eq!(ratios.mar(&set), 0.5);
    }
}
