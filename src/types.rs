//! Core types and configuration for the orientation fusion library

use crate::error::FusionError;
use tracing::warn;

/// Coefficient used whenever a configured coefficient is rejected
pub const DEFAULT_COEFFICIENT: f32 = 0.5;

/// Kind of sensor a raw sample came from
///
/// Units follow the usual mobile sensor conventions: accelerometer and
/// gravity in m/s², magnetometer in µT, gyroscope in rad/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Raw specific force; at rest it points away from the earth
    Accelerometer,
    /// Platform gravity estimate; preferred over the accelerometer once seen
    Gravity,
    /// Magnetic field
    Magnetometer,
    /// Angular velocity
    Gyroscope,
}

/// Fusion strategy
///
/// Exactly one strategy is active at a time.
///
/// # Strategies
/// - **OrientationVector**: complementary blend of `[azimuth, pitch, roll]` angles
/// - **RotationMatrix**: complementary blend of rotation matrices
/// - **Quaternion**: complementary blend of quaternions by SLERP
/// - **Kalman**: quaternion Kalman filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// Complementary filter over orientation angles
    OrientationVector,
    /// Complementary filter over rotation matrices
    RotationMatrix,
    /// Complementary filter over quaternions
    #[default]
    Quaternion,
    /// Quaternion Kalman filter
    Kalman,
}

/// Tracking state shared by every strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FusionState {
    /// Waiting for the first valid absolute orientation
    #[default]
    Uninitialized,
    /// Producing fused estimates
    Tracking,
}

/// Where the mean filter is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SmoothingStage {
    /// Smooth raw accelerometer, gravity and magnetometer samples
    Sensors,
    /// Smooth the fused orientation vector
    #[default]
    Orientation,
}

/// Mean filter settings
///
/// # Example
/// ```
/// use orientation_fusion::MeanFilterSettings;
///
/// // Half a second of smoothing at 50 Hz
/// let settings = MeanFilterSettings::from_time_constant(0.5, 50.0);
/// assert!(settings.enabled);
/// assert_eq!(settings.window, 25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeanFilterSettings {
    /// Whether smoothing is applied at all
    pub enabled: bool,
    /// Number of samples averaged; 1 passes values through
    pub window: usize,
    /// Signals the filter is applied to
    pub stage: SmoothingStage,
}

impl MeanFilterSettings {
    /// Enabled settings whose window spans `time_constant` seconds at `sample_frequency` Hz
    pub fn from_time_constant(time_constant: f32, sample_frequency: f32) -> Self {
        let samples = time_constant * sample_frequency;
        let window = if samples.is_finite() && samples >= 1.0 {
            (samples + 0.5) as usize
        } else {
            1
        };

        Self {
            enabled: true,
            window,
            ..Default::default()
        }
    }
}

impl Default for MeanFilterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            window: 30,
            stage: SmoothingStage::default(),
        }
    }
}

/// Gyroscope calibration settings
///
/// The calibrator commits a bias estimate only after the device has been
/// still for `min_duration` seconds.
///
/// # Example
/// ```
/// use orientation_fusion::CalibrationSettings;
///
/// let settings = CalibrationSettings {
///     min_duration: 3.0,      // Require 3 s of stillness
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationSettings {
    /// Whether gyroscope samples are bias corrected
    pub enabled: bool,
    /// Number of angular-velocity magnitudes in the stillness window
    pub window: usize,
    /// Maximum variance of the magnitude window, in (rad/s)², to count as still
    pub variance_threshold: f32,
    /// Maximum angular-velocity magnitude, in rad/s, to count as still
    ///
    /// A constant rotation has zero magnitude variance; this bound keeps
    /// it from being mistaken for bias.
    pub max_rate: f32,
    /// Seconds of continuous stillness before the bias is committed
    pub min_duration: f32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            window: 20,
            variance_threshold: 1e-4,
            max_rate: 0.1,
            min_duration: 2.0,
        }
    }
}

/// Quaternion Kalman filter noise settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KalmanSettings {
    /// Process noise spectral density, scaled by the time step
    pub process_noise: f32,
    /// Variance of each absolute quaternion component
    pub measurement_noise: f32,
}

impl Default for KalmanSettings {
    fn default() -> Self {
        Self {
            process_noise: 0.05,
            measurement_noise: 0.01,
        }
    }
}

/// Fusion engine settings
///
/// Each complementary strategy has its own blend coefficient α. Higher values
/// trust the integrated gyroscope, lower values the absolute orientation.
/// Coefficients outside (0, 1] are replaced by [`DEFAULT_COEFFICIENT`].
///
/// # Example
/// ```
/// use orientation_fusion::{FusionSettings, Strategy};
///
/// let settings = FusionSettings {
///     strategy: Strategy::RotationMatrix,
///     rotation_matrix_coefficient: 0.98,
///     ..Default::default()
/// };
/// assert_eq!(settings.coefficient(), 0.98);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FusionSettings {
    /// Active fusion strategy
    pub strategy: Strategy,
    /// Blend coefficient of the orientation-vector complementary filter
    pub orientation_coefficient: f32,
    /// Blend coefficient of the rotation-matrix complementary filter
    pub rotation_matrix_coefficient: f32,
    /// Blend coefficient of the quaternion complementary filter
    pub quaternion_coefficient: f32,
    /// Kalman filter noise model
    pub kalman: KalmanSettings,
    /// Mean filter smoothing
    pub mean_filter: MeanFilterSettings,
    /// Gyroscope bias calibration
    pub calibration: CalibrationSettings,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            orientation_coefficient: DEFAULT_COEFFICIENT,
            rotation_matrix_coefficient: DEFAULT_COEFFICIENT,
            quaternion_coefficient: DEFAULT_COEFFICIENT,
            kalman: KalmanSettings::default(),
            mean_filter: MeanFilterSettings::default(),
            calibration: CalibrationSettings::default(),
        }
    }
}

impl FusionSettings {
    /// Blend coefficient of the active strategy
    ///
    /// The Kalman filter computes its own gain and reports 1.
    pub fn coefficient(&self) -> f32 {
        match self.strategy {
            Strategy::OrientationVector => self.orientation_coefficient,
            Strategy::RotationMatrix => self.rotation_matrix_coefficient,
            Strategy::Quaternion => self.quaternion_coefficient,
            Strategy::Kalman => 1.0,
        }
    }

    /// Replace every coefficient outside (0, 1] with [`DEFAULT_COEFFICIENT`]
    ///
    /// All coefficients are checked; the first rejected one is reported.
    pub fn sanitize(&mut self) -> Result<(), FusionError> {
        let mut result = Ok(());
        for coefficient in [
            &mut self.orientation_coefficient,
            &mut self.rotation_matrix_coefficient,
            &mut self.quaternion_coefficient,
        ] {
            if let Err(error) = validate_coefficient(*coefficient) {
                warn!(
                    value = *coefficient,
                    default = DEFAULT_COEFFICIENT,
                    "filter coefficient must be in (0, 1], using default"
                );
                *coefficient = DEFAULT_COEFFICIENT;
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }
}

/// Check that a blend coefficient lies in (0, 1]
pub fn validate_coefficient(value: f32) -> Result<f32, FusionError> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(FusionError::InvalidCoefficient { value })
    }
}
