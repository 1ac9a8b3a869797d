//! Perspective-n-Point solver
//!
//! Linear DLT seed followed by Levenberg-Marquardt refinement of the
//! rotation vector and translation against pixel reprojection error.

use crate::geometry::{rodrigues, rotation_vector};
use crate::landmarks::Point2;
use crate::pose::CameraModel;
use crate::DmsError;
use nalgebra::{DMatrix, DVector, Matrix3, Matrix3x4, Matrix4, Matrix6, SymmetricEigen, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Minimum correspondences for the DLT seed
pub const MIN_CORRESPONDENCES: usize = 6;

/// Squared reprojection error (pixels²) treated as an exact fit
const EXACT_FIT_COST: f64 = 1e-16;

const MAX_DAMPING: f64 = 1e12;

/// Smallest-to-largest singular value ratio below which the DLT rotation block is rank deficient
const DLT_MIN_CONDITION: f64 = 1e-6;

/// Refinement settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Iteration budget before the solve counts as not converged
    pub max_iterations: usize,
    /// Relative step and cost-decrease tolerance
    pub tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
        }
    }
}

/// Solved object pose
#[derive(Debug, Clone, PartialEq)]
pub struct PnpSolution {
    /// Axis-angle rotation (object to camera)
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
    /// Root-mean-square reprojection error in pixels
    pub rms_error: f64,
    pub iterations: usize,
}

/// Solve for the pose mapping `object` points onto `image` points.
///
/// # Errors
///
/// `PoseEstimationFailure` on mismatched or insufficient input, non-finite
/// image points, non-convergence, or a non-finite result.
pub fn solve_pnp(
    object: &[Vector3<f64>],
    image: &[Point2],
    camera: &CameraModel,
    settings: &SolverSettings,
) -> Result<PnpSolution, DmsError> {
    if object.len() != image.len() {
        return Err(DmsError::PoseEstimationFailure(format!(
            "{} object points but {} image points",
            object.len(),
            image.len()
        )));
    }
    if object.len() < MIN_CORRESPONDENCES {
        return Err(DmsError::PoseEstimationFailure(format!(
            "need at least {} correspondences, got {}",
            MIN_CORRESPONDENCES,
            object.len()
        )));
    }
    if !image.iter().all(Point2::is_finite) {
        return Err(DmsError::PoseEstimationFailure("non-finite image point".into()));
    }

    let mut seeds = Vec::with_capacity(3);
    if let Some(seed) = dlt_seed(object, image, camera) {
        seeds.push(seed);
    } else {
        debug!("DLT seed degenerate, falling back to weak-perspective seeds");
    }
    seeds.extend(weak_perspective_seeds(object, image, camera));

    let mut last_error = None;
    let mut best: Option<PnpSolution> = None;
    for seed in seeds {
        match refine(object, image, camera, seed, settings) {
            Ok(solution) if solution.translation.z <= 0.0 => {
                last_error = Some(DmsError::PoseEstimationFailure("solution lies behind the camera".into()));
            }
            Ok(solution) => {
                if solution.rms_error <= 1.0 {
                    return Ok(solution);
                }
                if best.as_ref().map_or(true, |b| solution.rms_error < b.rms_error) {
                    best = Some(solution);
                }
            }
            Err(e) => last_error = Some(e),
        }
    }

    best.ok_or_else(|| {
        last_error.unwrap_or_else(|| DmsError::PoseEstimationFailure("no usable initial estimate".into()))
    })
}

/// Reprojection residuals (projected − observed), `None` if a point hits the principal plane
fn residuals(
    object: &[Vector3<f64>],
    image: &[Point2],
    camera: &CameraModel,
    params: &Vector6<f64>,
) -> Option<DVector<f64>> {
    let r = rodrigues(&Vector3::new(params[0], params[1], params[2]));
    let t = Vector3::new(params[3], params[4], params[5]);

    let mut out = DVector::zeros(2 * object.len());
    for (i, (p, q)) in object.iter().zip(image).enumerate() {
        let projected = camera.project(&(r * p + t))?;
        out[2 * i] = projected.x - q.x;
        out[2 * i + 1] = projected.y - q.y;
    }
    Some(out)
}

/// Central-difference Jacobian of the residuals
fn jacobian(
    object: &[Vector3<f64>],
    image: &[Point2],
    camera: &CameraModel,
    params: &Vector6<f64>,
) -> Option<DMatrix<f64>> {
    let mut jac = DMatrix::zeros(2 * object.len(), 6);
    for j in 0..6 {
        let h = 1e-6 * (1.0 + params[j].abs());
        let mut forward = *params;
        let mut backward = *params;
        forward[j] += h;
        backward[j] -= h;
        let diff = (residuals(object, image, camera, &forward)?
            - residuals(object, image, camera, &backward)?)
            / (2.0 * h);
        jac.set_column(j, &diff);
    }
    Some(jac)
}

fn refine(
    object: &[Vector3<f64>],
    image: &[Point2],
    camera: &CameraModel,
    seed: Vector6<f64>,
    settings: &SolverSettings,
) -> Result<PnpSolution, DmsError> {
    let mut params = seed;
    let mut current = residuals(object, image, camera, &params)
        .ok_or_else(|| DmsError::PoseEstimationFailure("initial estimate is degenerate".into()))?;
    let mut cost = current.norm_squared();
    let mut damping = 1e-3;

    for iteration in 0..=settings.max_iterations {
        if cost <= EXACT_FIT_COST {
            return finish(params, cost, object.len(), iteration);
        }
        if iteration == settings.max_iterations {
            break;
        }

        let jac = jacobian(object, image, camera, &params)
            .ok_or_else(|| DmsError::PoseEstimationFailure("jacobian is degenerate".into()))?;
        let jtj = jac.transpose() * &jac;
        let normal = Matrix6::from_iterator(jtj.iter().copied());
        let gradient = Vector6::from_iterator((jac.transpose() * &current).iter().copied());

        let converged = loop {
            let mut damped = normal;
            for i in 0..6 {
                damped[(i, i)] += damping * normal[(i, i)].max(1e-9);
            }

            let step = damped
                .cholesky()
                .map(|c| c.solve(&(-gradient)))
                .filter(|s| s.iter().all(|v| v.is_finite()));

            if let Some(step) = step {
                let candidate = params + step;
                if let Some(next) = residuals(object, image, camera, &candidate) {
                    let next_cost = next.norm_squared();
                    if next_cost < cost {
                        let small_step =
                            step.norm() <= settings.tolerance * (params.norm() + settings.tolerance);
                        let small_decrease = cost - next_cost <= settings.tolerance * cost;
                        params = candidate;
                        current = next;
                        cost = next_cost;
                        damping = (damping / 10.0).max(1e-12);
                        break small_step || small_decrease;
                    }
                }
            }

            damping *= 10.0;
            if damping > MAX_DAMPING {
                // no descent direction left: stationary point
                break true;
            }
        };

        trace!("LM iteration {}: cost {:.3e}, damping {:.1e}", iteration, cost, damping);
        if converged {
            return finish(params, cost, object.len(), iteration + 1);
        }
    }

    Err(DmsError::PoseEstimationFailure(format!(
        "refinement did not converge within {} iterations",
        settings.max_iterations
    )))
}

fn finish(params: Vector6<f64>, cost: f64, n: usize, iterations: usize) -> Result<PnpSolution, DmsError> {
    if !params.iter().all(|v| v.is_finite()) || !cost.is_finite() {
        return Err(DmsError::PoseEstimationFailure("solver produced non-finite pose".into()));
    }
    Ok(PnpSolution {
        rotation: Vector3::new(params[0], params[1], params[2]),
        translation: Vector3::new(params[3], params[4], params[5]),
        rms_error: (cost / n as f64).sqrt(),
        iterations,
    })
}

fn pack(rotation: Vector3<f64>, translation: Vector3<f64>) -> Vector6<f64> {
    Vector6::new(rotation.x, rotation.y, rotation.z, translation.x, translation.y, translation.z)
}

/// Direct linear transform on normalized coordinates
fn dlt_seed(object: &[Vector3<f64>], image: &[Point2], camera: &CameraModel) -> Option<Vector6<f64>> {
    let n = object.len();
    let centroid = object.iter().fold(Vector3::zeros(), |acc, p| acc + p) / n as f64;
    let spread = object.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n as f64;
    if spread <= f64::EPSILON {
        return None;
    }
    let scale = 3f64.sqrt() / spread;

    let mut a = DMatrix::<f64>::zeros(2 * n, 12);
    for (i, (p, q)) in object.iter().zip(image).enumerate() {
        let x = (p - centroid) * scale;
        let (u, v) = camera.normalize(q);
        let xh = [x.x, x.y, x.z, 1.0];
        for j in 0..4 {
            a[(2 * i, j)] = xh[j];
            a[(2 * i, 8 + j)] = -u * xh[j];
            a[(2 * i + 1, 4 + j)] = xh[j];
            a[(2 * i + 1, 8 + j)] = -v * xh[j];
        }
    }

    let eigen = SymmetricEigen::new(a.transpose() * &a);
    let (min_idx, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.total_cmp(y.1))?;
    let h = eigen.eigenvectors.column(min_idx);

    // Undo the model normalization: P = Pn · T
    let normalization = Matrix4::new(
        scale, 0.0, 0.0, -scale * centroid.x,
        0.0, scale, 0.0, -scale * centroid.y,
        0.0, 0.0, scale, -scale * centroid.z,
        0.0, 0.0, 0.0, 1.0,
    );
    let mut projection = Matrix3x4::from_fn(|r, c| h[r * 4 + c]) * normalization;

    let mut m: Matrix3<f64> = projection.fixed_view::<3, 3>(0, 0).into_owned();
    if m.determinant() < 0.0 {
        projection = -projection;
        m = -m;
    }

    let svd = m.svd(true, true);
    if svd.singular_values.min() <= DLT_MIN_CONDITION * svd.singular_values.max() {
        return None;
    }
    let lambda = svd.singular_values.mean();
    if !(lambda > f64::EPSILON) {
        return None;
    }
    let rotation = svd.u? * svd.v_t?;
    if rotation.determinant() <= 0.0 {
        return None;
    }

    let translation: Vector3<f64> = projection.column(3).into_owned() / lambda;
    if !(translation.z > 0.0) || !translation.iter().all(|v| v.is_finite()) {
        return None;
    }

    Some(pack(rotation_vector(&rotation), translation))
}

/// Scaled-orthographic seeds for frontal and flipped orientations
fn weak_perspective_seeds(object: &[Vector3<f64>], image: &[Point2], camera: &CameraModel) -> Vec<Vector6<f64>> {
    let n = object.len() as f64;
    let centroid = object.iter().fold(Vector3::zeros(), |acc, p| acc + p) / n;
    let object_spread = object.iter().map(|p| (p - centroid).xy().norm()).sum::<f64>() / n;

    let (cu, cv) = image
        .iter()
        .fold((0.0, 0.0), |(su, sv), q| (su + q.x / n, sv + q.y / n));
    let image_spread = image.iter().map(|q| (q.x - cu).hypot(q.y - cv)).sum::<f64>() / n;

    if !(image_spread > f64::EPSILON && object_spread > f64::EPSILON) {
        return Vec::new();
    }

    let depth = camera.focal_length * object_spread / image_spread;
    let translation = Vector3::new(
        (cu - camera.center.x) * depth / camera.focal_length,
        (cv - camera.center.y) * depth / camera.focal_length,
        depth,
    );

    [Vector3::zeros(), Vector3::new(std::f64::consts::PI, 0.0, 0.0)]
        .into_iter()
        .map(|rotation| pack(rotation, translation))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::PoseModel;

    fn project_all(
        model: &PoseModel,
        rotation: &Vector3<f64>,
        translation: &Vector3<f64>,
        camera: &CameraModel,
    ) -> Vec<Point2> {
        let r = rodrigues(rotation);
        model
            .points()
            .iter()
            .map(|p| camera.project(&(r * p + translation)).unwrap())
            .collect()
    }

    #[test]
    fn test_synthetic_recovery() {
        let camera = CameraModel::for_frame(1024, 576);
        let model = PoseModel::canonical();
        let cases = [
            (Vector3::new(3.0, 0.1, -0.05), Vector3::new(-40.0, 25.0, 1500.0)),
            (Vector3::new(0.1, -0.2, 0.05), Vector3::new(10.0, -20.0, 1000.0)),
            (Vector3::new(2.6, -0.4, 0.3), Vector3::new(120.0, 60.0, 2500.0)),
        ];

        for (rotation, translation) in cases {
            let image = project_all(&model, &rotation, &translation, &camera);
            let solution = solve_pnp(model.points(), &image, &camera, &SolverSettings::default()).unwrap();

            assert!(
                (rodrigues(&solution.rotation) - rodrigues(&rotation)).norm() < 1e-6,
                "rotation mismatch for {:?}",
                rotation
            );
            assert!((solution.translation - translation).norm() < 1e-3);
            assert!(solution.rms_error < 1e-6);
        }
    }

    #[test]
    fn test_recovery_with_pixel_noise() {
        let camera = CameraModel::for_frame(1024, 576);
        let model = PoseModel::canonical();
        let rotation = Vector3::new(2.9, 0.2, 0.1);
        let translation = Vector3::new(15.0, -30.0, 1800.0);

        let noise = [0.4, -0.3, 0.2, 0.5, -0.6, 0.1, 0.3, -0.2, -0.4, 0.6, 0.2, -0.1];
        let image: Vec<Point2> = project_all(&model, &rotation, &translation, &camera)
            .into_iter()
            .enumerate()
            .map(|(i, p)| Point2::new(p.x + noise[2 * i], p.y + noise[2 * i + 1]))
            .collect();

        let solution = solve_pnp(model.points(), &image, &camera, &SolverSettings::default()).unwrap();
        assert!(solution.rms_error < 1.0);

        let angle_error = rotation_vector(&(rodrigues(&solution.rotation) * rodrigues(&rotation).transpose())).norm();
        assert!(angle_error.to_degrees() < 3.0);
    }

    #[test]
    fn test_rejects_mismatched_input() {
        let camera = CameraModel::for_frame(640, 480);
        let model = PoseModel::canonical();
        let image = vec![Point2::new(1.0, 1.0); 5];
        assert!(matches!(
            solve_pnp(model.points(), &image, &camera, &SolverSettings::default()),
            Err(DmsError::PoseEstimationFailure(_))
        ));
        assert!(solve_pnp(&model.points()[..5], &image, &camera, &SolverSettings::default()).is_err());
    }

    #[test]
    fn test_rejects_non_finite_image_points() {
        let camera = CameraModel::for_frame(640, 480);
        let model = PoseModel::canonical();
        let mut image = vec![Point2::new(320.0, 240.0); 6];
        image[2].x = f64::NAN;
        assert!(matches!(
            solve_pnp(model.points(), &image, &camera, &SolverSettings::default()),
            Err(DmsError::PoseEstimationFailure(_))
        ));
    }

    #[test]
    fn test_coincident_image_points_fail() {
        let camera = CameraModel::for_frame(64, 48);
        let model = PoseModel::canonical();
        let image = vec![Point2::new(10.0, 10.0); 6];
        assert!(dlt_seed(model.points(), &image, &camera).is_none());
        assert!(weak_perspective_seeds(model.points(), &image, &camera).is_empty());
        assert!(matches!(
            solve_pnp(model.points(), &image, &camera, &SolverSettings::default()),
            Err(DmsError::PoseEstimationFailure(_))
        ));
    }

    #[test]
    fn test_iteration_budget_exhaustion() {
        let camera = CameraModel::for_frame(1024, 576);
        let model = PoseModel::canonical();
        let rotation = Vector3::new(2.9, 0.2, 0.1);
        let translation = Vector3::new(15.0, -30.0, 1800.0);
        let mut image = project_all(&model, &rotation, &translation, &camera);
        image[1].y += 25.0;

        let settings = SolverSettings {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            solve_pnp(model.points(), &image, &camera, &settings),
            Err(DmsError::PoseEstimationFailure(_))
        ));
    }
}
