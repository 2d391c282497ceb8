//! Quaternion Kalman filter
//!
//! The state is the device-to-world quaternion itself, stored in nalgebra's
//! `[x, y, z, w]` coordinate order. The gyroscope drives the prediction and
//! the absolute orientation is the measurement, observed directly (`H = I`).

use crate::error::FusionError;
use crate::integrator::{delta_quaternion, validate_time_step};
use crate::math::normalize_quaternion;
use crate::types::KalmanSettings;
use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3, Vector4};

/// Matrix `F` with `F · q.coords == (q ⊗ delta).coords`
///
/// Rows and columns follow nalgebra's `[x, y, z, w]` order.
pub fn transition_matrix(delta: &UnitQuaternion<f32>) -> Matrix4<f32> {
    let (dx, dy, dz, dw) = (delta.i, delta.j, delta.k, delta.w);
    #[rustfmt::skip]
    let matrix = Matrix4::new(
         dw,  dz, -dy, dx,
        -dz,  dw,  dx, dy,
         dy, -dx,  dw, dz,
        -dx, -dy, -dz, dw,
    );
    matrix
}

/// Kalman filter over the orientation quaternion
///
/// # Example
/// ```
/// use nalgebra::{UnitQuaternion, Vector3};
/// use orientation_fusion::{KalmanSettings, QuaternionKalmanFilter};
///
/// let absolute = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3);
/// let initial = UnitQuaternion::identity();
/// let mut filter = QuaternionKalmanFilter::new(KalmanSettings::default(), &initial);
///
/// for _ in 0..200 {
///     filter.update(Vector3::zeros(), 0.01, &absolute).unwrap();
/// }
/// assert!(filter.quaternion().angle_to(&absolute) < 0.01);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuaternionKalmanFilter {
    state: Vector4<f32>,
    covariance: Matrix4<f32>,
    settings: KalmanSettings,
}

impl QuaternionKalmanFilter {
    /// Start at `initial` with covariance `measurement_noise · I`
    pub fn new(settings: KalmanSettings, initial: &UnitQuaternion<f32>) -> Self {
        Self {
            state: initial.coords,
            covariance: Matrix4::identity() * settings.measurement_noise,
            settings,
        }
    }

    /// Propagate the state and covariance through one gyroscope sample
    pub fn predict(&mut self, gyroscope: Vector3<f32>, delta_time: f32) -> Result<(), FusionError> {
        let delta_time = validate_time_step(delta_time)?;
        let transition = transition_matrix(&delta_quaternion(gyroscope, delta_time)?);

        let state = normalize_quaternion(Quaternion::from(transition * self.state))?;
        self.state = state.coords;
        self.covariance = transition * self.covariance * transition.transpose()
            + Matrix4::identity() * (self.settings.process_noise * delta_time);
        Ok(())
    }

    /// Correct the prediction with an absolute orientation
    ///
    /// The measurement is flipped into the predicted hemisphere first since
    /// `q` and `-q` are the same rotation. On error the prediction is kept.
    pub fn correct(&mut self, measurement: &UnitQuaternion<f32>) -> Result<(), FusionError> {
        let mut observed = measurement.coords;
        if observed.dot(&self.state) < 0.0 {
            observed = -observed;
        }

        let innovation_covariance =
            self.covariance + Matrix4::identity() * self.settings.measurement_noise;
        let inverse = innovation_covariance
            .try_inverse()
            .ok_or(FusionError::SingularCovariance)?;
        let gain = self.covariance * inverse;

        let state = normalize_quaternion(Quaternion::from(
            self.state + gain * (observed - self.state),
        ))?;
        let covariance = (Matrix4::identity() - gain) * self.covariance;

        self.state = state.coords;
        self.covariance = (covariance + covariance.transpose()) * 0.5;
        Ok(())
    }

    /// Predict with the gyroscope, then correct with the absolute orientation
    pub fn update(
        &mut self,
        gyroscope: Vector3<f32>,
        delta_time: f32,
        measurement: &UnitQuaternion<f32>,
    ) -> Result<(), FusionError> {
        self.predict(gyroscope, delta_time)?;
        self.correct(measurement)
    }

    /// Current orientation estimate
    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::new_unchecked(Quaternion::from(self.state))
    }

    /// Error covariance in `[x, y, z, w]` order
    pub fn covariance(&self) -> Matrix4<f32> {
        self.covariance
    }

    pub fn settings(&self) -> KalmanSettings {
        self.settings
    }
}
