//! Absolute orientation from gravity and magnetic field
//!
//! The accelerometer (or a platform gravity sensor) fixes the vertical axis
//! and the magnetometer fixes north. The result never drifts but carries the
//! full noise of both sensors, so it is only used to correct the gyroscope.

use crate::error::FusionError;
use crate::math::{Vector3Ext, matrix_to_quaternion, orientation_from_matrix};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use tracing::trace;

/// Smallest accepted sine of the angle between gravity and the magnetic field
///
/// Below this the horizontal field component is too weak to define north.
const MIN_FIELD_INCLINATION_SINE: f32 = 1e-3;

/// Drift-free orientation derived from gravity and magnetic field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteOrientation {
    /// Device-to-world rotation matrix, rows are east, north and up in device coordinates
    pub matrix: Matrix3<f32>,
    /// Quaternion equivalent of `matrix`
    pub quaternion: UnitQuaternion<f32>,
}

impl AbsoluteOrientation {
    /// Compute the orientation from an acceleration and a magnetic field reading
    ///
    /// `acceleration` is the specific force reported at rest, which points away
    /// from the earth. Down is its opposite; east is `down × field` and north
    /// is `east × down`.
    ///
    /// # Errors
    /// [`FusionError::DegenerateVector`] when either reading is (near) zero or
    /// the field is (near) parallel to gravity.
    ///
    /// # Example
    /// ```
    /// use nalgebra::{Matrix3, Vector3};
    /// use orientation_fusion::AbsoluteOrientation;
    ///
    /// // Device lying flat with its top pointing north
    /// let acceleration = Vector3::new(0.0, 0.0, 9.81);
    /// let magnetic = Vector3::new(0.0, 22.0, -42.0);
    ///
    /// let absolute = AbsoluteOrientation::from_vectors(acceleration, magnetic).unwrap();
    /// assert!((absolute.matrix - Matrix3::identity()).norm() < 1e-5);
    /// ```
    pub fn from_vectors(
        acceleration: Vector3<f32>,
        magnetic: Vector3<f32>,
    ) -> Result<Self, FusionError> {
        let down = -acceleration.checked_normalize()?;
        let field = magnetic.checked_normalize()?;

        let east = down.cross(&field);
        if !(east.norm() >= MIN_FIELD_INCLINATION_SINE) {
            return Err(FusionError::DegenerateVector);
        }
        let east = east.normalize();
        let north = east.cross(&down);
        let up = -down;

        let matrix = Matrix3::from_rows(&[east.transpose(), north.transpose(), up.transpose()]);

        Ok(Self {
            matrix,
            quaternion: matrix_to_quaternion(&matrix),
        })
    }

    /// Orientation vector `[azimuth, pitch, roll]` in radians
    pub fn orientation(&self) -> Vector3<f32> {
        orientation_from_matrix(&self.matrix)
    }
}

/// Keeps the latest valid absolute orientation
///
/// A degenerate reading is reported and leaves the previous estimate in place.
#[derive(Debug, Clone, Default)]
pub struct AbsoluteOrientationEstimator {
    current: Option<AbsoluteOrientation>,
}

impl AbsoluteOrientationEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the absolute orientation from new readings
    pub fn update(
        &mut self,
        acceleration: Vector3<f32>,
        magnetic: Vector3<f32>,
    ) -> Result<AbsoluteOrientation, FusionError> {
        match AbsoluteOrientation::from_vectors(acceleration, magnetic) {
            Ok(absolute) => {
                self.current = Some(absolute);
                Ok(absolute)
            }
            Err(error) => {
                trace!(%error, "absolute orientation kept from previous sample");
                Err(error)
            }
        }
    }

    /// Latest valid absolute orientation
    pub fn current(&self) -> Option<AbsoluteOrientation> {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::FRAC_PI_2;
    use nalgebra::Rotation3;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn gravity() -> Vector3<f32> {
        Vector3::new(0.0, 0.0, 9.81)
    }

    fn field() -> Vector3<f32> {
        Vector3::new(0.0, 22.0, -42.0)
    }

    #[test]
    fn test_level_device_facing_north_is_identity() {
        let absolute = AbsoluteOrientation::from_vectors(gravity(), field()).unwrap();
        assert!((absolute.matrix - Matrix3::identity()).norm() < 1e-5);
        assert!(absolute.quaternion.angle() < 2e-3);
        assert!(absolute.orientation().norm() < 1e-5);
    }

    #[test]
    fn test_device_facing_east() {
        // Device top points east, so north lies along -x in device coordinates
        let magnetic = Vector3::new(-22.0, 0.0, -42.0);
        let absolute = AbsoluteOrientation::from_vectors(gravity(), magnetic).unwrap();

        let orientation = absolute.orientation();
        assert!((orientation.x - FRAC_PI_2).abs() < 1e-5);
        assert!(orientation.y.abs() < 1e-5);
        assert!(orientation.z.abs() < 1e-5);
    }

    #[test]
    fn test_matches_rotated_references() {
        let mut rng = Pcg64::seed_from_u64(7);

        for _ in 0..50 {
            let rotation = Rotation3::from_euler_angles(
                rng.random_range(-3.0..3.0),
                rng.random_range(-1.4..1.4),
                rng.random_range(-3.0..3.0),
            );
            // Readings seen by a device whose device-to-world rotation is `rotation`
            let acceleration = rotation.inverse() * gravity();
            let magnetic = rotation.inverse() * field();

            let absolute = AbsoluteOrientation::from_vectors(acceleration, magnetic).unwrap();
            let m = absolute.matrix;
            assert!((m * m.transpose() - Matrix3::identity()).norm() < 1e-5);
            assert!((m.determinant() - 1.0).abs() < 1e-5);
            assert!((m - rotation.into_inner()).norm() < 1e-4);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(
            AbsoluteOrientation::from_vectors(Vector3::zeros(), field()),
            Err(FusionError::DegenerateVector)
        );
        assert_eq!(
            AbsoluteOrientation::from_vectors(gravity(), Vector3::zeros()),
            Err(FusionError::DegenerateVector)
        );
        assert_eq!(
            AbsoluteOrientation::from_vectors(gravity(), Vector3::new(0.0, 0.0, -40.0)),
            Err(FusionError::DegenerateVector)
        );
    }

    #[test]
    fn test_estimator_retains_previous_on_error() {
        let mut estimator = AbsoluteOrientationEstimator::new();
        assert!(estimator.current().is_none());

        let first = estimator.update(gravity(), field()).unwrap();
        let result = estimator.update(gravity(), Vector3::new(0.0, 0.0, 35.0));
        assert_eq!(result, Err(FusionError::DegenerateVector));
        assert_eq!(estimator.current(), Some(first));

        estimator.reset();
        assert!(estimator.current().is_none());
    }
}
