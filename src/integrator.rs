//! Gyroscope integration
//!
//! Each sample contributes the rotation `ω·Δt` in the device frame, composed
//! on the right of the current orientation. Errors accumulate without bound;
//! only the absolute orientation can remove them.

use crate::error::FusionError;
use crate::math::{
    EPSILON, axis_angle_to_matrix, elapsed_seconds, matrix_from_orientation,
    orientation_from_matrix, orthonormalize,
};
// Float methods for no_std builds
#[allow(unused_imports)]
use nalgebra::ComplexField;
use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Tracks gyroscope timestamps and turns them into time steps
#[derive(Debug, Clone, Copy, Default)]
pub struct GyroscopeIntegrator {
    last_timestamp: Option<u64>,
}

impl GyroscopeIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous gyroscope sample
    ///
    /// Returns `Ok(None)` for the first sample. A timestamp that does not
    /// advance is rejected and does not replace the stored one.
    ///
    /// # Example
    /// ```
    /// use orientation_fusion::GyroscopeIntegrator;
    ///
    /// let mut integrator = GyroscopeIntegrator::new();
    /// assert_eq!(integrator.time_step(1_000_000_000), Ok(None));
    /// assert_eq!(integrator.time_step(1_010_000_000), Ok(Some(0.01)));
    /// assert!(integrator.time_step(1_010_000_000).is_err());
    /// ```
    pub fn time_step(&mut self, timestamp: u64) -> Result<Option<f32>, FusionError> {
        let Some(last) = self.last_timestamp else {
            self.last_timestamp = Some(timestamp);
            return Ok(None);
        };

        let delta_time = validate_time_step(elapsed_seconds(last, timestamp))?;
        self.last_timestamp = Some(timestamp);
        Ok(Some(delta_time))
    }

    /// Forget the previous timestamp so the next sample starts a new interval
    pub fn reset(&mut self) {
        self.last_timestamp = None;
    }
}

/// Accept only positive, finite time steps
pub fn validate_time_step(delta_time: f32) -> Result<f32, FusionError> {
    if delta_time > 0.0 && delta_time.is_finite() {
        Ok(delta_time)
    } else {
        Err(FusionError::InvalidTimeStep { delta_time })
    }
}

/// Rotation matrix turned through by `gyroscope` over `delta_time` seconds
pub fn delta_rotation_matrix(
    gyroscope: Vector3<f32>,
    delta_time: f32,
) -> Result<Matrix3<f32>, FusionError> {
    let delta_time = validate_time_step(delta_time)?;
    Ok(axis_angle_to_matrix(&(gyroscope * delta_time)))
}

/// Quaternion turned through by `gyroscope` over `delta_time` seconds
///
/// Uses the exact axis-angle form, or the first-order form `(1, ω·Δt/2)`
/// when the angle is too small to define an axis.
pub fn delta_quaternion(
    gyroscope: Vector3<f32>,
    delta_time: f32,
) -> Result<UnitQuaternion<f32>, FusionError> {
    let delta_time = validate_time_step(delta_time)?;
    let rotation = gyroscope * delta_time;
    let angle = rotation.norm();

    let quaternion = if angle < EPSILON {
        Quaternion::from_parts(1.0, rotation * 0.5)
    } else {
        let (sin, cos) = (angle * 0.5).sin_cos();
        Quaternion::from_parts(cos, rotation * (sin / angle))
    };

    Ok(UnitQuaternion::from_quaternion(quaternion))
}

/// Integrate a rotation matrix, re-orthonormalizing the result
pub fn integrate_matrix(
    matrix: &Matrix3<f32>,
    gyroscope: Vector3<f32>,
    delta_time: f32,
) -> Result<Matrix3<f32>, FusionError> {
    let delta = delta_rotation_matrix(gyroscope, delta_time)?;
    Ok(orthonormalize(&(matrix * delta)))
}

/// Integrate a quaternion, renormalizing the result
pub fn integrate_quaternion(
    quaternion: &UnitQuaternion<f32>,
    gyroscope: Vector3<f32>,
    delta_time: f32,
) -> Result<UnitQuaternion<f32>, FusionError> {
    let delta = delta_quaternion(gyroscope, delta_time)?;
    Ok(UnitQuaternion::from_quaternion(
        quaternion.quaternion() * delta.quaternion(),
    ))
}

/// Integrate an orientation vector `[azimuth, pitch, roll]` through its matrix form
pub fn integrate_orientation(
    orientation: &Vector3<f32>,
    gyroscope: Vector3<f32>,
    delta_time: f32,
) -> Result<Vector3<f32>, FusionError> {
    let matrix = integrate_matrix(&matrix_from_orientation(orientation), gyroscope, delta_time)?;
    Ok(orientation_from_matrix(&matrix))
}
