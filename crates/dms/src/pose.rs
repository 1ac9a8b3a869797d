//! Head pose estimation from six facial landmarks

use crate::geometry::{self, EulerAngles};
use crate::landmarks::Point2;
use crate::pnp::{self, SolverSettings};
use crate::DmsError;
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

/// Canonical 3D face template (model units), in `POSE_LANDMARK_INDICES` order
pub const MODEL_POINTS: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],          // Nose tip
    [0.0, -330.0, -65.0],     // Chin
    [-225.0, 170.0, -135.0],  // Left eye left corner
    [225.0, 170.0, -135.0],   // Right eye right corner
    [-150.0, -150.0, -125.0], // Left mouth corner
    [150.0, -150.0, -125.0],  // Right mouth corner
];

/// Model-space point along the facing direction, projected for the overlay line
pub const FORWARD_POINT: [f64; 3] = [0.0, 0.0, 1000.0];

/// Pinhole intrinsics derived from the frame size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    /// Focal length in pixels (equal to the frame width)
    pub focal_length: f64,
    /// Principal point (frame center)
    pub center: Point2,
    pub width: u32,
    pub height: u32,
}

impl CameraModel {
    /// Unit aspect, zero skew, zero distortion
    pub fn for_frame(width: u32, height: u32) -> Self {
        let focal_length = f64::from(width);
        Self {
            focal_length,
            center: Point2::new(f64::from(width) / 2.0, f64::from(height) / 2.0),
            width,
            height,
        }
    }

    /// Whether this model was built for the given frame size
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// 3x3 intrinsic matrix
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focal_length, 0.0, self.center.x,
            0.0, self.focal_length, self.center.y,
            0.0, 0.0, 1.0,
        )
    }

    /// Project a camera-space point; `None` on the principal plane or for non-finite results
    pub fn project(&self, point: &Vector3<f64>) -> Option<Point2> {
        if point.z.abs() <= f64::EPSILON {
            return None;
        }
        let projected = Point2::new(
            self.focal_length * point.x / point.z + self.center.x,
            self.focal_length * point.y / point.z + self.center.y,
        );
        projected.is_finite().then_some(projected)
    }

    /// Pixel to normalized image coordinates
    pub fn normalize(&self, pixel: &Point2) -> (f64, f64) {
        (
            (pixel.x - self.center.x) / self.focal_length,
            (pixel.y - self.center.y) / self.focal_length,
        )
    }
}

/// Static 3D landmark template
#[derive(Debug, Clone)]
pub struct PoseModel {
    points: Vec<Vector3<f64>>,
}

impl Default for PoseModel {
    fn default() -> Self {
        Self::canonical()
    }
}

impl PoseModel {
    /// The anthropometric six-point template
    pub fn canonical() -> Self {
        Self {
            points: MODEL_POINTS
                .iter()
                .map(|p| Vector3::new(p[0], p[1], p[2]))
                .collect(),
        }
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    /// Camera intrinsics for a frame of the given size
    pub fn camera_model(&self, width: u32, height: u32) -> CameraModel {
        CameraModel::for_frame(width, height)
    }
}

/// Result of one head pose estimation
#[derive(Debug, Clone)]
pub struct PoseEstimate {
    /// Axis-angle rotation
    pub rotation_vector: Vector3<f64>,
    pub translation: Vector3<f64>,
    pub rotation_matrix: Matrix3<f64>,
    pub euler: EulerAngles,
    /// Normalized pitch in degrees
    pub tilt_degrees: f64,
    /// First input landmark (nose tip)
    pub start_point: Point2,
    /// Projection of the model's forward point
    pub end_point: Point2,
    /// `end_point` x at half the frame height
    pub end_point_alt: Point2,
    /// Root-mean-square reprojection error in pixels
    pub rms_error: f64,
}

/// Head pose estimator using the PnP solve
#[derive(Debug, Clone, Default)]
pub struct HeadPoseEstimator {
    model: PoseModel,
    settings: SolverSettings,
}

impl HeadPoseEstimator {
    pub fn new(model: PoseModel, settings: SolverSettings) -> Self {
        Self { model, settings }
    }

    pub fn model(&self) -> &PoseModel {
        &self.model
    }

    /// Estimate head pose for a frame of the given size
    pub fn estimate(
        &self,
        image_points: &[Point2; 6],
        width: u32,
        height: u32,
    ) -> Result<PoseEstimate, DmsError> {
        let camera = self.model.camera_model(width, height);
        self.estimate_with_camera(image_points, &camera)
    }

    /// Estimate head pose with precomputed intrinsics
    ///
    /// # Errors
    ///
    /// - `PoseEstimationFailure` if the solver does not converge or yields
    ///   non-finite values, or the forward axis cannot be projected
    /// - `NumericalInstability` if the rotation matrix is not orthogonal
    pub fn estimate_with_camera(
        &self,
        image_points: &[Point2; 6],
        camera: &CameraModel,
    ) -> Result<PoseEstimate, DmsError> {
        let solution = pnp::solve_pnp(self.model.points(), image_points, camera, &self.settings)?;

        let rotation_matrix = geometry::rodrigues(&solution.rotation);
        geometry::ensure_rotation(&rotation_matrix)?;

        let euler = geometry::euler_angles(&rotation_matrix);

        let forward = Vector3::new(FORWARD_POINT[0], FORWARD_POINT[1], FORWARD_POINT[2]);
        let end_point = camera
            .project(&(rotation_matrix * forward + solution.translation))
            .ok_or_else(|| {
                DmsError::PoseEstimationFailure("forward axis does not project into the image plane".into())
            })?;
        let end_point_alt = Point2::new(end_point.x, f64::from(camera.height / 2));

        debug!(
            "Pose: pitch {:.1} yaw {:.1} roll {:.1} (rms {:.2}px, {} iterations)",
            euler.pitch, euler.yaw, euler.roll, solution.rms_error, solution.iterations
        );

        Ok(PoseEstimate {
            rotation_vector: solution.rotation,
            translation: solution.translation,
            rotation_matrix,
            euler,
            tilt_degrees: euler.pitch,
            start_point: image_points[0],
            end_point,
            end_point_alt,
            rms_error: solution.rms_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rodrigues;

    fn synthetic_points(rvec: Vector3<f64>, tvec: Vector3<f64>, camera: &CameraModel) -> [Point2; 6] {
        let r = rodrigues(&rvec);
        let model = PoseModel::canonical();
        let mut points = [Point2::default(); 6];
        for (dst, p) in points.iter_mut().zip(model.points()) {
            *dst = camera.project(&(r * p + tvec)).unwrap();
        }
        points
    }

    #[test]
    fn test_camera_model_from_frame() {
        let camera = CameraModel::for_frame(1024, 576);
        assert_eq!(camera.focal_length, 1024.0);
        assert_eq!(camera.center, Point2::new(512.0, 288.0));
        assert_eq!(camera.matrix()[(0, 2)], 512.0);
        assert_eq!(camera.matrix()[(2, 2)], 1.0);
        assert!(camera.matches(1024, 576));
        assert!(!camera.matches(1024, 577));
    }

    #[test]
    fn test_projection_on_principal_plane() {
        let camera = CameraModel::for_frame(640, 480);
        assert!(camera.project(&Vector3::new(1.0, 1.0, 0.0)).is_none());
        assert_eq!(camera.project(&Vector3::new(0.0, 0.0, 10.0)), Some(Point2::new(320.0, 240.0)));
    }

    #[test]
    fn test_frontal_face_pose() {
        // Face looking at the camera: model y-up maps to image y-down
        let camera = CameraModel::for_frame(1024, 576);
        let rvec = Vector3::new(std::f64::consts::PI, 0.0, 0.0);
        let tvec = Vector3::new(0.0, 0.0, 2000.0);
        let points = synthetic_points(rvec, tvec, &camera);

        let estimate = HeadPoseEstimator::default()
            .estimate(&points, 1024, 576)
            .unwrap();

        assert!((estimate.tilt_degrees.abs() - 180.0).abs() < 1e-3);
        assert!(estimate.euler.yaw.abs() < 1e-3);
        assert!((estimate.translation - tvec).norm() < 1e-3);
        assert!(estimate.rms_error < 1e-6);
        assert_eq!(estimate.start_point, points[0]);
        // forward axis points straight back at the camera: projects onto the nose
        assert!(estimate.end_point.distance(&points[0]) < 1e-3);
        assert_eq!(estimate.end_point_alt.y, 288.0);
        assert_eq!(estimate.end_point_alt.x, estimate.end_point.x);
    }

    #[test]
    fn test_nodding_face_tilt() {
        let camera = CameraModel::for_frame(1024, 576);
        // 20 degree nod on top of the frontal flip
        let flip = rodrigues(&Vector3::new(std::f64::consts::PI, 0.0, 0.0));
        let nod = rodrigues(&Vector3::new(20f64.to_radians(), 0.0, 0.0));
        let rvec = geometry::rotation_vector(&(nod * flip));
        let points = synthetic_points(rvec, Vector3::new(30.0, -40.0, 1800.0), &camera);

        let estimate = HeadPoseEstimator::default()
            .estimate_with_camera(&points, &camera)
            .unwrap();
        assert!((estimate.tilt_degrees - (-160.0)).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_non_finite_landmarks() {
        let mut points = [Point2::new(100.0, 100.0); 6];
        points[3] = Point2::new(f64::INFINITY, 0.0);
        let result = HeadPoseEstimator::default().estimate(&points, 640, 480);
        assert!(matches!(result, Err(DmsError::PoseEstimationFailure(_))));
    }
}
