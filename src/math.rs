//! Mathematical utilities and nalgebra extensions for orientation fusion
//!
//! All rotations map device-frame vectors into the world frame
//! (x = east, y = north, z = up), so `world = R * device`.

use crate::error::FusionError;
// Float methods for no_std builds
#[allow(unused_imports)]
use nalgebra::{ComplexField, RealField};
use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Magnitude below which a vector is treated as zero
pub const EPSILON: f32 = 1e-6;

/// Above this cosine two quaternions are close enough to interpolate linearly
const SLERP_LINEAR_THRESHOLD: f32 = 0.9995;

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Normalize the vector, failing when its magnitude is below [`EPSILON`]
    fn checked_normalize(&self) -> Result<Vector3<f32>, FusionError>;
}

impl Vector3Ext for Vector3<f32> {
    fn checked_normalize(&self) -> Result<Vector3<f32>, FusionError> {
        let magnitude = self.norm();
        if !(magnitude >= EPSILON) || !magnitude.is_finite() {
            return Err(FusionError::DegenerateVector);
        }
        Ok(*self / magnitude)
    }
}

/// Extension trait for UnitQuaternion operations
pub trait QuaternionExt {
    /// Convert quaternion to an orientation vector `[azimuth, pitch, roll]` in radians
    fn to_orientation(&self) -> Vector3<f32>;

    /// Create quaternion from an orientation vector `[azimuth, pitch, roll]` in radians
    fn from_orientation(orientation: &Vector3<f32>) -> UnitQuaternion<f32>;
}

impl QuaternionExt for UnitQuaternion<f32> {
    fn to_orientation(&self) -> Vector3<f32> {
        orientation_from_matrix(&quaternion_to_matrix(self))
    }

    fn from_orientation(orientation: &Vector3<f32>) -> UnitQuaternion<f32> {
        matrix_to_quaternion(&matrix_from_orientation(orientation))
    }
}

/// Normalize a raw quaternion, failing when it is (near) zero
pub fn normalize_quaternion(
    quaternion: Quaternion<f32>,
) -> Result<UnitQuaternion<f32>, FusionError> {
    let norm = quaternion.norm();
    if !(norm >= EPSILON) || !norm.is_finite() {
        return Err(FusionError::DegenerateVector);
    }
    Ok(UnitQuaternion::new_unchecked(quaternion / norm))
}

/// Skew-symmetric cross product matrix, `skew(a) * b == a × b`
fn skew(v: &Vector3<f32>) -> Matrix3<f32> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Convert a rotation vector (axis scaled by angle in radians) to a rotation matrix
///
/// Uses Rodrigues' formula. Below [`EPSILON`] the first-order form `I + [v]×`
/// is used and re-orthonormalized.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use orientation_fusion::math::axis_angle_to_matrix;
///
/// let m = axis_angle_to_matrix(&Vector3::new(0.0, 0.0, core::f32::consts::FRAC_PI_2));
/// let x = m * Vector3::x();
/// assert!((x - Vector3::y()).norm() < 1e-6);
/// ```
pub fn axis_angle_to_matrix(rotation_vector: &Vector3<f32>) -> Matrix3<f32> {
    let angle = rotation_vector.norm();
    if angle < EPSILON {
        return orthonormalize(&(Matrix3::identity() + skew(rotation_vector)));
    }

    let k = skew(&(rotation_vector / angle));
    let (sin, cos) = angle.sin_cos();
    Matrix3::identity() + k * sin + k * k * (1.0 - cos)
}

/// Convert a rotation matrix to the equivalent unit quaternion
///
/// Picks the branch with the largest of the trace and the diagonal elements
/// so the square root argument never approaches zero.
pub fn matrix_to_quaternion(m: &Matrix3<f32>) -> UnitQuaternion<f32> {
    let trace = m[(0, 0)] + m[(1, 1)] + m[(2, 2)];

    let quaternion = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        Quaternion::new(
            0.25 * s,
            (m[(2, 1)] - m[(1, 2)]) / s,
            (m[(0, 2)] - m[(2, 0)]) / s,
            (m[(1, 0)] - m[(0, 1)]) / s,
        )
    } else if m[(0, 0)] > m[(1, 1)] && m[(0, 0)] > m[(2, 2)] {
        let s = (1.0 + m[(0, 0)] - m[(1, 1)] - m[(2, 2)]).sqrt() * 2.0;
        Quaternion::new(
            (m[(2, 1)] - m[(1, 2)]) / s,
            0.25 * s,
            (m[(0, 1)] + m[(1, 0)]) / s,
            (m[(0, 2)] + m[(2, 0)]) / s,
        )
    } else if m[(1, 1)] > m[(2, 2)] {
        let s = (1.0 + m[(1, 1)] - m[(0, 0)] - m[(2, 2)]).sqrt() * 2.0;
        Quaternion::new(
            (m[(0, 2)] - m[(2, 0)]) / s,
            (m[(0, 1)] + m[(1, 0)]) / s,
            0.25 * s,
            (m[(1, 2)] + m[(2, 1)]) / s,
        )
    } else {
        let s = (1.0 + m[(2, 2)] - m[(0, 0)] - m[(1, 1)]).sqrt() * 2.0;
        Quaternion::new(
            (m[(1, 0)] - m[(0, 1)]) / s,
            (m[(0, 2)] + m[(2, 0)]) / s,
            (m[(1, 2)] + m[(2, 1)]) / s,
            0.25 * s,
        )
    };

    UnitQuaternion::from_quaternion(quaternion)
}

/// Convert a unit quaternion to the equivalent rotation matrix
pub fn quaternion_to_matrix(quaternion: &UnitQuaternion<f32>) -> Matrix3<f32> {
    quaternion.to_rotation_matrix().into_inner()
}

/// Restore orthonormality of a matrix that drifted through repeated products
///
/// Splits the dot product error between the first two rows, rebuilds the
/// third row from their cross product and normalizes all three.
pub fn orthonormalize(matrix: &Matrix3<f32>) -> Matrix3<f32> {
    let x = matrix.row(0).transpose();
    let y = matrix.row(1).transpose();

    let error = x.dot(&y);
    let x_orthogonal = x - y * (0.5 * error);
    let y_orthogonal = y - x * (0.5 * error);
    let z_orthogonal = x_orthogonal.cross(&y_orthogonal);

    Matrix3::from_rows(&[
        x_orthogonal.normalize().transpose(),
        y_orthogonal.normalize().transpose(),
        z_orthogonal.normalize().transpose(),
    ])
}

/// Spherical linear interpolation from `from` (t = 0) to `to` (t = 1)
///
/// Takes the shortest arc and falls back to normalized linear interpolation
/// when the quaternions are nearly identical.
///
/// # Example
/// ```
/// use nalgebra::{UnitQuaternion, Vector3};
/// use orientation_fusion::math::slerp;
///
/// let a = UnitQuaternion::identity();
/// let b = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.0);
/// let half = slerp(&a, &b, 0.5);
/// assert!((half.angle() - 0.5).abs() < 1e-4);
/// ```
pub fn slerp(from: &UnitQuaternion<f32>, to: &UnitQuaternion<f32>, t: f32) -> UnitQuaternion<f32> {
    let start = *from.quaternion();
    let mut end = *to.quaternion();

    let mut cos_theta = start.coords.dot(&end.coords);
    if cos_theta < 0.0 {
        end = -end;
        cos_theta = -cos_theta;
    }

    if cos_theta > SLERP_LINEAR_THRESHOLD {
        return UnitQuaternion::from_quaternion(start * (1.0 - t) + end * t);
    }

    let theta = cos_theta.min(1.0).acos();
    let sin_theta = theta.sin();
    let start_weight = ((1.0 - t) * theta).sin() / sin_theta;
    let end_weight = (t * theta).sin() / sin_theta;

    UnitQuaternion::from_quaternion(start * start_weight + end * end_weight)
}

/// Extract `[azimuth, pitch, roll]` in radians from a device-to-world rotation matrix
///
/// Azimuth is measured clockwise from north around the down axis, so a
/// device whose top points east reads +π/2.
pub fn orientation_from_matrix(m: &Matrix3<f32>) -> Vector3<f32> {
    let azimuth = m[(0, 1)].atan2(m[(1, 1)]);
    let pitch = (-m[(2, 1)]).clamp(-1.0, 1.0).asin();
    let roll = (-m[(2, 0)]).atan2(m[(2, 2)]);
    Vector3::new(azimuth, pitch, roll)
}

/// Build a device-to-world rotation matrix from `[azimuth, pitch, roll]` in radians
///
/// Inverse of [`orientation_from_matrix`] for pitch within (-π/2, π/2).
pub fn matrix_from_orientation(orientation: &Vector3<f32>) -> Matrix3<f32> {
    let (sin_azimuth, cos_azimuth) = orientation.x.sin_cos();
    let (sin_pitch, cos_pitch) = orientation.y.sin_cos();
    let (sin_roll, cos_roll) = orientation.z.sin_cos();

    #[rustfmt::skip]
    let azimuth = Matrix3::new(
        cos_azimuth, sin_azimuth, 0.0,
        -sin_azimuth, cos_azimuth, 0.0,
        0.0, 0.0, 1.0,
    );
    #[rustfmt::skip]
    let pitch = Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, cos_pitch, sin_pitch,
        0.0, -sin_pitch, cos_pitch,
    );
    #[rustfmt::skip]
    let roll = Matrix3::new(
        cos_roll, 0.0, sin_roll,
        0.0, 1.0, 0.0,
        -sin_roll, 0.0, cos_roll,
    );

    azimuth * pitch * roll
}

/// Wrap an angle into (-π, π]
pub fn wrap_angle(angle: f32) -> f32 {
    let pi = core::f32::consts::PI;
    let tau = core::f32::consts::TAU;

    let mut wrapped = angle % tau;
    if wrapped > pi {
        wrapped -= tau;
    } else if wrapped <= -pi {
        wrapped += tau;
    }
    wrapped
}

/// Shortest signed angle that takes `from` to `to`, in (-π, π]
pub fn angle_difference(to: f32, from: f32) -> f32 {
    wrap_angle(to - from)
}

/// Seconds from timestamp `from` to timestamp `to`, both in nanoseconds
///
/// Negative when `to` precedes `from`.
pub fn elapsed_seconds(from: u64, to: u64) -> f32 {
    const NANOS_TO_SECONDS: f64 = 1e-9;

    if to >= from {
        ((to - from) as f64 * NANOS_TO_SECONDS) as f32
    } else {
        -(((from - to) as f64 * NANOS_TO_SECONDS) as f32)
    }
}
