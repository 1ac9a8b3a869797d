//! Rotation representations: Rodrigues, orthogonality check, Euler decomposition

use crate::DmsError;
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Maximum Frobenius deviation of RᵀR from the identity
pub const ORTHOGONALITY_TOLERANCE: f64 = 1e-6;

/// Below this `sqrt(R00² + R10²)` the decomposition takes the gimbal-lock branch
pub const SINGULARITY_THRESHOLD: f64 = 1e-6;

/// Euler angles in degrees. Pitch is normalized into (-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Skew-symmetric cross-product matrix of `v`
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Rotation matrix from an axis-angle vector: R = I + sin θ·K + (1 − cos θ)·K²
pub fn rodrigues(rvec: &Vector3<f64>) -> Matrix3<f64> {
    let theta = rvec.norm();
    if theta <= f64::EPSILON {
        return Matrix3::identity();
    }
    let k = skew(&(rvec / theta));
    Matrix3::identity() + k * theta.sin() + (k * k) * (1.0 - theta.cos())
}

/// Axis-angle vector of a rotation matrix (inverse of `rodrigues`)
pub fn rotation_vector(r: &Matrix3<f64>) -> Vector3<f64> {
    let rotation = Rotation3::from_matrix_unchecked(*r);
    UnitQuaternion::from_rotation_matrix(&rotation).scaled_axis()
}

/// ‖RᵀR − I‖ (Frobenius)
pub fn orthogonality_error(r: &Matrix3<f64>) -> f64 {
    (r.transpose() * r - Matrix3::identity()).norm()
}

pub fn is_rotation_matrix(r: &Matrix3<f64>) -> bool {
    orthogonality_error(r) < ORTHOGONALITY_TOLERANCE
}

/// Fail with `NumericalInstability` unless `r` is orthogonal
pub fn ensure_rotation(r: &Matrix3<f64>) -> Result<(), DmsError> {
    let deviation = orthogonality_error(r);
    // NaN deviation must fail too
    if deviation < ORTHOGONALITY_TOLERANCE {
        Ok(())
    } else {
        Err(DmsError::NumericalInstability { deviation })
    }
}

/// Wrap an angle in degrees into (-180, 180]
pub fn normalize_angle(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Decompose R = Rz(roll)·Ry(yaw)·Rx(pitch).
///
/// Near ±90° yaw the pitch and roll axes coincide; only yaw and the
/// combined rotation about the collapsed axis are meaningful there.
pub fn euler_angles(r: &Matrix3<f64>) -> EulerAngles {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();

    let (x, y, z) = if sy >= SINGULARITY_THRESHOLD {
        (
            r[(2, 1)].atan2(r[(2, 2)]),
            (-r[(2, 0)]).atan2(sy),
            r[(1, 0)].atan2(r[(0, 0)]),
        )
    } else {
        (
            (-r[(1, 2)]).atan2(r[(1, 1)]),
            (-r[(2, 0)]).atan2(sy),
            r[(1, 0)].atan2(r[(0, 0)]),
        )
    };

    EulerAngles {
        pitch: normalize_angle(x.to_degrees()),
        yaw: y.to_degrees(),
        roll: z.to_degrees(),
    }
}

/// Compose Rz(roll)·Ry(yaw)·Rx(pitch) from angles in degrees
pub fn rotation_from_euler(angles: EulerAngles) -> Matrix3<f64> {
    let (sx, cx) = angles.pitch.to_radians().sin_cos();
    let (sy, cy) = angles.yaw.to_radians().sin_cos();
    let (sz, cz) = angles.roll.to_radians().sin_cos();

    let rx = Matrix3::new(1.0, 0.0, 0.0, 0.0, cx, -sx, 0.0, sx, cx);
    let ry = Matrix3::new(cy, 0.0, sy, 0.0, 1.0, 0.0, -sy, 0.0, cy);
    let rz = Matrix3::new(cz, -sz, 0.0, sz, cz, 0.0, 0.0, 0.0, 1.0);
    rz * ry * rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn angle_diff(a: f64, b: f64) -> f64 {
        normalize_angle(a - b).abs()
    }

    #[test]
    fn test_identity() {
        let r = rodrigues(&Vector3::zeros());
        assert_eq!(r, Matrix3::identity());
        assert!(is_rotation_matrix(&r));
        assert_eq!(euler_angles(&r), EulerAngles::default());
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(190.0), -170.0);
        assert_eq!(normalize_angle(-190.0), 170.0);
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(360.0), 0.0);
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(-180.0), 180.0);
        assert_eq!(normalize_angle(725.0), 5.0);
    }

    #[test]
    fn test_rodrigues_matches_axis_angle() {
        let rvec = Vector3::new(0.3, -1.2, 0.7);
        let expected = Rotation3::new(rvec);
        assert!((rodrigues(&rvec) - expected.matrix()).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_vector_round_trip_near_pi() {
        for rvec in [
            Vector3::new(0.1, 0.2, -0.3),
            Vector3::new(std::f64::consts::PI - 1e-9, 0.0, 0.0),
            Vector3::new(0.0, 3.0, 0.5),
        ] {
            let recovered = rotation_vector(&rodrigues(&rvec));
            assert!((rodrigues(&recovered) - rodrigues(&rvec)).norm() < 1e-9);
        }
    }

    #[test]
    fn test_perturbed_matrix_fails_check() {
        let mut r = rodrigues(&Vector3::new(0.4, 0.1, -0.9));
        r[(0, 1)] += 1e-5;
        assert!(!is_rotation_matrix(&r));
        assert!(matches!(
            ensure_rotation(&r),
            Err(DmsError::NumericalInstability { deviation }) if deviation > 1e-6
        ));
    }

    #[test]
    fn test_non_finite_matrix_fails_check() {
        let mut r = Matrix3::identity();
        r[(2, 2)] = f64::NAN;
        assert!(ensure_rotation(&r).is_err());
    }

    #[test]
    fn test_euler_round_trip_fixed() {
        let angles = EulerAngles {
            pitch: 170.0,
            yaw: -35.0,
            roll: 12.5,
        };
        let recovered = euler_angles(&rotation_from_euler(angles));
        assert!(angle_diff(recovered.pitch, 170.0) < 1e-4);
        assert!((recovered.yaw + 35.0).abs() < 1e-4);
        assert!((recovered.roll - 12.5).abs() < 1e-4);
    }

    #[test]
    fn test_gimbal_lock_branch() {
        // Exact yaw = 90° with a rotation of 25° about the collapsed axis
        let (s, c) = 25f64.to_radians().sin_cos();
        let r = Matrix3::new(
            0.0, s, c,
            0.0, c, -s,
            -1.0, 0.0, 0.0,
        );
        assert!(is_rotation_matrix(&r));

        let angles = euler_angles(&r);
        assert!((angles.yaw - 90.0).abs() < 1e-9);
        // pitch and roll are not separable here; only their combination is fixed
        assert!(angle_diff(angles.pitch - angles.roll, 25.0) < 1e-9);
    }

    #[test]
    fn test_gimbal_lock_yaw_from_composition() {
        let r = rotation_from_euler(EulerAngles {
            pitch: 30.0,
            yaw: 90.0,
            roll: 0.0,
        });
        let angles = euler_angles(&r);
        assert!((angles.yaw - 90.0).abs() < 1e-4);
    }

    proptest! {
        #[test]
        fn prop_rodrigues_is_orthogonal(
            x in -10.0f64..10.0,
            y in -10.0f64..10.0,
            z in -10.0f64..10.0,
        ) {
            let r = rodrigues(&Vector3::new(x, y, z));
            prop_assert!(is_rotation_matrix(&r));
            prop_assert!((r.determinant() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_off_diagonal_perturbation_detected(
            x in -3.0f64..3.0,
            y in -3.0f64..3.0,
            z in -3.0f64..3.0,
            delta in 2e-6f64..1e-2,
            row in 0usize..3,
            offset in 1usize..3,
        ) {
            let mut r = rodrigues(&Vector3::new(x, y, z));
            r[(row, (row + offset) % 3)] += delta;
            prop_assert!(!is_rotation_matrix(&r));
        }

        #[test]
        fn prop_euler_round_trip(
            pitch in -179.0f64..179.0,
            yaw in -85.0f64..85.0,
            roll in -179.0f64..179.0,
        ) {
            let recovered = euler_angles(&rotation_from_euler(EulerAngles { pitch, yaw, roll }));
            prop_assert!(angle_diff(recovered.pitch, pitch) < 1e-4);
            prop_assert!((recovered.yaw - yaw).abs() < 1e-4);
            prop_assert!(angle_diff(recovered.roll, roll) < 1e-4);
        }

        #[test]
        fn prop_normalized_range(angle in -2000.0f64..2000.0) {
            let n = normalize_angle(angle);
            prop_assert!(n > -180.0 && n <= 180.0);
            prop_assert!(((angle - n) / 360.0 - ((angle - n) / 360.0).round()).abs() < 1e-9);
        }
    }
}
