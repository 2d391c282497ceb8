//! Orientation fusion engine

use crate::absolute::{AbsoluteOrientation, AbsoluteOrientationEstimator};
use crate::calibration::GyroscopeCalibrator;
use crate::complementary::ComplementaryFilter;
use crate::error::FusionError;
use crate::integrator::GyroscopeIntegrator;
use crate::kalman::QuaternionKalmanFilter;
use crate::math::{
    RAD_TO_DEG, matrix_from_orientation, matrix_to_quaternion, orientation_from_matrix,
    quaternion_to_matrix,
};
use crate::mean_filter::{AngularMeanFilter, VectorMeanFilter};
use crate::types::{FusionSettings, FusionState, SensorKind, SmoothingStage, Strategy};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use tracing::{debug, info, trace};

/// Active estimator, present only while tracking
#[derive(Debug, Clone, Copy)]
enum Estimator {
    Complementary(ComplementaryFilter),
    Kalman(QuaternionKalmanFilter),
}

impl Estimator {
    fn start(settings: &FusionSettings, initial: &AbsoluteOrientation) -> Self {
        match settings.strategy {
            Strategy::OrientationVector => {
                Self::Complementary(ComplementaryFilter::from_orientation_vector(initial))
            }
            Strategy::RotationMatrix => {
                Self::Complementary(ComplementaryFilter::from_rotation_matrix(initial))
            }
            Strategy::Quaternion => {
                Self::Complementary(ComplementaryFilter::from_quaternion(initial))
            }
            Strategy::Kalman => {
                Self::Kalman(QuaternionKalmanFilter::new(settings.kalman, &initial.quaternion))
            }
        }
    }

    fn update(
        &mut self,
        gyroscope: Vector3<f32>,
        delta_time: f32,
        absolute: &AbsoluteOrientation,
        coefficient: f32,
    ) -> Result<(), FusionError> {
        match self {
            Self::Complementary(filter) => {
                filter.update(gyroscope, delta_time, absolute, coefficient)
            }
            Self::Kalman(filter) => filter.update(gyroscope, delta_time, &absolute.quaternion),
        }
    }

    fn orientation(&self) -> Vector3<f32> {
        match self {
            Self::Complementary(filter) => filter.orientation(),
            Self::Kalman(filter) => {
                orientation_from_matrix(&quaternion_to_matrix(&filter.quaternion()))
            }
        }
    }

    fn quaternion(&self) -> UnitQuaternion<f32> {
        match self {
            Self::Complementary(filter) => filter.quaternion(),
            Self::Kalman(filter) => filter.quaternion(),
        }
    }

    fn rotation_matrix(&self) -> Matrix3<f32> {
        match self {
            Self::Complementary(filter) => filter.rotation_matrix(),
            Self::Kalman(filter) => quaternion_to_matrix(&filter.quaternion()),
        }
    }
}

/// Orientation fusion engine
///
/// Ingests accelerometer, gravity, magnetometer and gyroscope samples in the
/// order they arrive and keeps a fused device-to-world orientation.
/// Absolute samples refresh the drift-free reference; gyroscope samples drive
/// the active strategy. Tracking starts with the first valid absolute
/// orientation.
///
/// Errors are never fatal: the offending sample is skipped, the last valid
/// orientation is kept and the error is returned as a notice.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use orientation_fusion::{FusionEngine, FusionState, SensorKind};
///
/// let mut engine = FusionEngine::new();
/// engine.on_sensor_sample(SensorKind::Accelerometer, Vector3::new(0.0, 0.0, 9.81), 0).unwrap();
/// engine.on_sensor_sample(SensorKind::Magnetometer, Vector3::new(0.0, 22.0, -42.0), 0).unwrap();
/// assert_eq!(engine.state(), FusionState::Tracking);
///
/// engine.on_sensor_sample(SensorKind::Gyroscope, Vector3::zeros(), 0).unwrap();
/// engine.on_sensor_sample(SensorKind::Gyroscope, Vector3::zeros(), 10_000_000).unwrap();
/// assert!(engine.orientation().norm() < 1e-4);
/// assert!(engine.heading() < 0.01 || engine.heading() > 359.99);
/// ```
#[derive(Debug, Clone)]
pub struct FusionEngine {
    settings: FusionSettings,
    paused: bool,
    estimator: Option<Estimator>,
    absolute: AbsoluteOrientationEstimator,
    calibrator: GyroscopeCalibrator,
    integrator: GyroscopeIntegrator,
    /// Latest (possibly smoothed) readings
    acceleration: Option<Vector3<f32>>,
    gravity: Option<Vector3<f32>>,
    magnetic: Option<Vector3<f32>>,
    acceleration_filter: VectorMeanFilter,
    gravity_filter: VectorMeanFilter,
    magnetic_filter: VectorMeanFilter,
    orientation_filter: AngularMeanFilter,
    /// Orientation vector reported to callers
    orientation: Vector3<f32>,
}

impl FusionEngine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::with_settings(FusionSettings::default())
    }

    /// Create an engine with the given settings
    ///
    /// Coefficients outside (0, 1] are replaced with the default and logged.
    /// Use [`FusionEngine::try_with_settings`] to observe the replacement.
    pub fn with_settings(settings: FusionSettings) -> Self {
        let (engine, _) = Self::try_with_settings(settings);
        engine
    }

    /// Create an engine with the given settings, reporting rejected coefficients
    ///
    /// The engine is always built; coefficients outside (0, 1] are replaced
    /// with the default and the first one is returned alongside it.
    ///
    /// # Example
    /// ```
    /// use orientation_fusion::{FusionEngine, FusionError, FusionSettings};
    ///
    /// let (engine, result) = FusionEngine::try_with_settings(FusionSettings {
    ///     quaternion_coefficient: 0.0,
    ///     ..Default::default()
    /// });
    ///
    /// assert_eq!(result, Err(FusionError::InvalidCoefficient { value: 0.0 }));
    /// assert_eq!(engine.coefficient(), 0.5);
    /// ```
    pub fn try_with_settings(mut settings: FusionSettings) -> (Self, Result<(), FusionError>) {
        let result = settings.sanitize();
        let window = smoothing_window(&settings);

        let engine = Self {
            settings,
            paused: false,
            estimator: None,
            absolute: AbsoluteOrientationEstimator::new(),
            calibrator: GyroscopeCalibrator::new(settings.calibration),
            integrator: GyroscopeIntegrator::new(),
            acceleration: None,
            gravity: None,
            magnetic: None,
            acceleration_filter: VectorMeanFilter::new(window),
            gravity_filter: VectorMeanFilter::new(window),
            magnetic_filter: VectorMeanFilter::new(window),
            orientation_filter: AngularMeanFilter::new(window),
            orientation: Vector3::zeros(),
        };
        (engine, result)
    }

    /// Apply new settings between updates
    ///
    /// Rejected coefficients are replaced with the default and the first one
    /// is returned as an error; the rest of the settings still take effect.
    /// Changing the strategy, or the noise model of an active Kalman filter,
    /// restarts tracking.
    /// Changing the calibration settings discards the bias estimate.
    ///
    /// # Example
    /// ```
    /// use orientation_fusion::{FusionEngine, FusionError, FusionSettings};
    ///
    /// let mut engine = FusionEngine::new();
    /// let result = engine.set_settings(FusionSettings {
    ///     quaternion_coefficient: 1.5,
    ///     ..Default::default()
    /// });
    ///
    /// assert_eq!(result, Err(FusionError::InvalidCoefficient { value: 1.5 }));
    /// assert_eq!(engine.coefficient(), 0.5);
    /// ```
    pub fn set_settings(&mut self, mut settings: FusionSettings) -> Result<(), FusionError> {
        let result = settings.sanitize();
        let previous = core::mem::replace(&mut self.settings, settings);

        if previous.strategy != settings.strategy {
            info!(from = ?previous.strategy, to = ?settings.strategy, "fusion strategy changed");
            self.restart_tracking();
        } else if settings.strategy == Strategy::Kalman && previous.kalman != settings.kalman {
            debug!("kalman noise model changed, tracking restarted");
            self.restart_tracking();
        }
        if previous.calibration != settings.calibration {
            self.calibrator = GyroscopeCalibrator::new(settings.calibration);
        }
        if previous.mean_filter != settings.mean_filter {
            self.rebuild_smoothing();
        }

        result
    }

    /// Feed one sensor sample
    ///
    /// # Arguments
    /// * `kind` - Sensor the sample came from
    /// * `values` - Reading in m/s² (accelerometer, gravity), µT (magnetometer)
    ///   or rad/s (gyroscope)
    /// * `timestamp` - Sample time in nanoseconds
    ///
    /// # Errors
    /// - [`FusionError::DegenerateVector`] for non-finite values or an
    ///   unusable gravity/field pair
    /// - [`FusionError::InvalidTimeStep`] for a gyroscope timestamp that does not advance
    /// - [`FusionError::SingularCovariance`] when the Kalman update cannot be solved
    ///
    /// In every case the previous orientation is kept.
    pub fn on_sensor_sample(
        &mut self,
        kind: SensorKind,
        values: Vector3<f32>,
        timestamp: u64,
    ) -> Result<(), FusionError> {
        if self.paused {
            trace!(?kind, "sample ignored while paused");
            return Ok(());
        }
        if !values.iter().all(|value| value.is_finite()) {
            debug!(?kind, "non-finite sample skipped");
            return Err(FusionError::DegenerateVector);
        }

        match kind {
            SensorKind::Accelerometer => {
                self.acceleration = Some(self.smooth_sensor(kind, values));
                self.update_absolute()
            }
            SensorKind::Gravity => {
                self.gravity = Some(self.smooth_sensor(kind, values));
                self.update_absolute()
            }
            SensorKind::Magnetometer => {
                self.magnetic = Some(self.smooth_sensor(kind, values));
                self.update_absolute()
            }
            SensorKind::Gyroscope => self.update_gyroscope(values, timestamp),
        }
    }

    /// Stop processing samples, keeping filter state and any committed bias
    ///
    /// A calibration still in progress is discarded.
    pub fn pause(&mut self) {
        self.paused = true;
        self.integrator.reset();
        self.calibrator.restart();
        info!("orientation fusion paused");
    }

    /// Resume processing samples
    ///
    /// The first gyroscope sample after resuming only sets the time base, so
    /// no integration step spans the pause. Stillness detection starts over
    /// with an empty window.
    pub fn resume(&mut self) {
        self.paused = false;
        self.integrator.reset();
        self.calibrator.restart();
        info!("orientation fusion resumed");
    }

    /// Restart the session: filters, readings and calibration return to their initial state
    pub fn reset(&mut self) {
        self.restart_tracking();
        self.absolute.reset();
        self.calibrator = GyroscopeCalibrator::new(self.settings.calibration);
        self.acceleration = None;
        self.gravity = None;
        self.magnetic = None;
        self.acceleration_filter.reset();
        self.gravity_filter.reset();
        self.magnetic_filter.reset();
        info!("orientation fusion reset");
    }

    /// Orientation vector `[azimuth, pitch, roll]` in radians
    ///
    /// Smoothed when the mean filter runs on the orientation stage. Zero until tracking starts.
    pub fn orientation(&self) -> Vector3<f32> {
        self.orientation
    }

    /// Device-to-world quaternion, identity until tracking starts
    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        match &self.estimator {
            Some(estimator) if !self.smooths_orientation() => estimator.quaternion(),
            Some(_) => matrix_to_quaternion(&matrix_from_orientation(&self.orientation)),
            None => UnitQuaternion::identity(),
        }
    }

    /// Device-to-world rotation matrix, identity until tracking starts
    pub fn rotation_matrix(&self) -> Matrix3<f32> {
        match &self.estimator {
            Some(estimator) if !self.smooths_orientation() => estimator.rotation_matrix(),
            Some(_) => matrix_from_orientation(&self.orientation),
            None => Matrix3::identity(),
        }
    }

    /// Compass bearing of the device's y axis in degrees, clockwise from north in [0, 360)
    pub fn heading(&self) -> f32 {
        let degrees = self.orientation.x * RAD_TO_DEG;
        let heading = if degrees < 0.0 { degrees + 360.0 } else { degrees };
        if heading >= 360.0 { 0.0 } else { heading }
    }

    pub fn state(&self) -> FusionState {
        if self.estimator.is_some() {
            FusionState::Tracking
        } else {
            FusionState::Uninitialized
        }
    }

    pub fn settings(&self) -> FusionSettings {
        self.settings
    }

    /// Blend coefficient of the active strategy
    pub fn coefficient(&self) -> f32 {
        self.settings.coefficient()
    }

    /// Gyroscope bias in rad/s, zero until calibration completes
    pub fn gyroscope_bias(&self) -> Vector3<f32> {
        self.calibrator.bias()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_calibrated()
    }

    /// Latest valid absolute orientation
    pub fn absolute_orientation(&self) -> Option<AbsoluteOrientation> {
        self.absolute.current()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn update_absolute(&mut self) -> Result<(), FusionError> {
        // A platform gravity estimate, once seen, replaces the raw accelerometer
        let down = self.gravity.or(self.acceleration);
        let (Some(down), Some(magnetic)) = (down, self.magnetic) else {
            return Ok(());
        };
        let absolute = self.absolute.update(down, magnetic)?;

        if self.estimator.is_none() {
            let estimator = Estimator::start(&self.settings, &absolute);
            self.estimator = Some(estimator);
            info!(strategy = ?self.settings.strategy, "orientation tracking started");
            self.publish(estimator.orientation());
        }
        Ok(())
    }

    fn update_gyroscope(&mut self, raw: Vector3<f32>, timestamp: u64) -> Result<(), FusionError> {
        // Rejected timestamps must not reach the calibrator
        let step = self.integrator.time_step(timestamp)?;
        let gyroscope = if self.settings.calibration.enabled {
            self.calibrator.update(raw, timestamp)
        } else {
            raw
        };

        let Some(delta_time) = step else {
            return Ok(());
        };
        let (Some(estimator), Some(absolute)) = (self.estimator.as_mut(), self.absolute.current())
        else {
            trace!("gyroscope sample before tracking started");
            return Ok(());
        };

        estimator.update(gyroscope, delta_time, &absolute, self.settings.coefficient())?;
        let orientation = estimator.orientation();
        self.publish(orientation);
        Ok(())
    }

    fn publish(&mut self, orientation: Vector3<f32>) {
        self.orientation = if self.smooths_orientation() {
            self.orientation_filter.add_angles(orientation)
        } else {
            orientation
        };
    }

    fn smooth_sensor(&mut self, kind: SensorKind, values: Vector3<f32>) -> Vector3<f32> {
        let mean_filter = self.settings.mean_filter;
        if !mean_filter.enabled || mean_filter.stage != SmoothingStage::Sensors {
            return values;
        }
        match kind {
            SensorKind::Accelerometer => self.acceleration_filter.add_vector(values),
            SensorKind::Gravity => self.gravity_filter.add_vector(values),
            SensorKind::Magnetometer => self.magnetic_filter.add_vector(values),
            SensorKind::Gyroscope => values,
        }
    }

    fn smooths_orientation(&self) -> bool {
        let mean_filter = self.settings.mean_filter;
        mean_filter.enabled && mean_filter.stage == SmoothingStage::Orientation
    }

    /// Drop the estimator so the next absolute orientation starts tracking again
    fn restart_tracking(&mut self) {
        self.estimator = None;
        self.integrator.reset();
        self.orientation_filter.reset();
        self.orientation = Vector3::zeros();
    }

    fn rebuild_smoothing(&mut self) {
        let window = smoothing_window(&self.settings);
        self.acceleration_filter = VectorMeanFilter::new(window);
        self.gravity_filter = VectorMeanFilter::new(window);
        self.magnetic_filter = VectorMeanFilter::new(window);
        self.orientation_filter = AngularMeanFilter::new(window);
        debug!(window, "smoothing window rebuilt");
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn smoothing_window(settings: &FusionSettings) -> usize {
    settings.mean_filter.window.max(1)
}
