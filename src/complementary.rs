//! Complementary filters
//!
//! A complementary filter trusts the integrated gyroscope over short time
//! scales and the absolute orientation over long ones. With coefficient α the
//! fused orientation moves a fraction `1 - α` of the way from the gyroscope
//! estimate toward the absolute one on every update:
//!
//! - α = 1 keeps the pure gyroscope estimate
//! - α → 0 follows the absolute orientation
//!
//! The three variants differ only in the representation they blend.

use crate::absolute::AbsoluteOrientation;
use crate::error::FusionError;
use crate::integrator::{integrate_matrix, integrate_orientation, integrate_quaternion};
use crate::math::{
    angle_difference, axis_angle_to_matrix, matrix_from_orientation, matrix_to_quaternion,
    orientation_from_matrix, orthonormalize, quaternion_to_matrix, slerp, wrap_angle,
};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Blend two orientation vectors `[azimuth, pitch, roll]` axis by axis
///
/// Each axis moves along the shortest angular difference, so blending never
/// sweeps through the ±π seam.
pub fn blend_orientation_vector(
    gyroscope: &Vector3<f32>,
    absolute: &Vector3<f32>,
    coefficient: f32,
) -> Vector3<f32> {
    gyroscope.zip_map(absolute, |g, a| {
        wrap_angle(g + (1.0 - coefficient) * angle_difference(a, g))
    })
}

/// Blend two rotation matrices along the geodesic between them
///
/// Computes `g · exp((1 - α) · log(gᵀ a))` and re-orthonormalizes.
pub fn blend_rotation_matrix(
    gyroscope: &Matrix3<f32>,
    absolute: &Matrix3<f32>,
    coefficient: f32,
) -> Matrix3<f32> {
    let difference = matrix_to_quaternion(&(gyroscope.transpose() * absolute));
    let correction = difference.scaled_axis() * (1.0 - coefficient);
    orthonormalize(&(gyroscope * axis_angle_to_matrix(&correction)))
}

/// Blend two quaternions by SLERP a fraction `1 - α` toward the absolute one
pub fn blend_quaternion(
    gyroscope: &UnitQuaternion<f32>,
    absolute: &UnitQuaternion<f32>,
    coefficient: f32,
) -> UnitQuaternion<f32> {
    slerp(gyroscope, absolute, 1.0 - coefficient)
}

/// Complementary filter state, one variant per blended representation
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use orientation_fusion::{AbsoluteOrientation, ComplementaryFilter};
///
/// let absolute = AbsoluteOrientation::from_vectors(
///     Vector3::new(0.0, 0.0, 9.81),
///     Vector3::new(0.0, 22.0, -42.0),
/// )
/// .unwrap();
///
/// let mut filter = ComplementaryFilter::from_quaternion(&absolute);
/// filter.update(Vector3::new(0.0, 0.0, 0.1), 0.01, &absolute, 0.98).unwrap();
/// let orientation = filter.orientation();
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComplementaryFilter {
    /// Blends `[azimuth, pitch, roll]` angles
    OrientationVector(Vector3<f32>),
    /// Blends device-to-world rotation matrices
    RotationMatrix(Matrix3<f32>),
    /// Blends device-to-world quaternions
    Quaternion(UnitQuaternion<f32>),
}

impl ComplementaryFilter {
    /// Orientation-vector filter starting at the given absolute orientation
    pub fn from_orientation_vector(initial: &AbsoluteOrientation) -> Self {
        Self::OrientationVector(initial.orientation())
    }

    /// Rotation-matrix filter starting at the given absolute orientation
    pub fn from_rotation_matrix(initial: &AbsoluteOrientation) -> Self {
        Self::RotationMatrix(initial.matrix)
    }

    /// Quaternion filter starting at the given absolute orientation
    pub fn from_quaternion(initial: &AbsoluteOrientation) -> Self {
        Self::Quaternion(initial.quaternion)
    }

    /// Integrate one gyroscope sample and blend the result with the absolute orientation
    ///
    /// On error the state is left untouched.
    ///
    /// # Arguments
    /// * `gyroscope` - Bias-corrected angular velocity in rad/s
    /// * `delta_time` - Seconds since the previous gyroscope sample
    /// * `absolute` - Latest absolute orientation
    /// * `coefficient` - Blend coefficient α in (0, 1]
    pub fn update(
        &mut self,
        gyroscope: Vector3<f32>,
        delta_time: f32,
        absolute: &AbsoluteOrientation,
        coefficient: f32,
    ) -> Result<(), FusionError> {
        match self {
            Self::OrientationVector(orientation) => {
                let integrated = integrate_orientation(orientation, gyroscope, delta_time)?;
                *orientation =
                    blend_orientation_vector(&integrated, &absolute.orientation(), coefficient);
            }
            Self::RotationMatrix(matrix) => {
                let integrated = integrate_matrix(matrix, gyroscope, delta_time)?;
                *matrix = blend_rotation_matrix(&integrated, &absolute.matrix, coefficient);
            }
            Self::Quaternion(quaternion) => {
                let integrated = integrate_quaternion(quaternion, gyroscope, delta_time)?;
                *quaternion = blend_quaternion(&integrated, &absolute.quaternion, coefficient);
            }
        }
        Ok(())
    }

    /// Orientation vector `[azimuth, pitch, roll]` in radians
    pub fn orientation(&self) -> Vector3<f32> {
        match self {
            Self::OrientationVector(orientation) => *orientation,
            Self::RotationMatrix(matrix) => orientation_from_matrix(matrix),
            Self::Quaternion(quaternion) => {
                orientation_from_matrix(&quaternion_to_matrix(quaternion))
            }
        }
    }

    /// Device-to-world rotation matrix
    pub fn rotation_matrix(&self) -> Matrix3<f32> {
        match self {
            Self::OrientationVector(orientation) => matrix_from_orientation(orientation),
            Self::RotationMatrix(matrix) => *matrix,
            Self::Quaternion(quaternion) => quaternion_to_matrix(quaternion),
        }
    }

    /// Device-to-world quaternion
    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        match self {
            Self::OrientationVector(orientation) => {
                matrix_to_quaternion(&matrix_from_orientation(orientation))
            }
            Self::RotationMatrix(matrix) => matrix_to_quaternion(matrix),
            Self::Quaternion(quaternion) => *quaternion,
        }
    }
}
