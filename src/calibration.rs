//! Gyroscope bias calibration

use crate::math::elapsed_seconds;
use crate::types::CalibrationSettings;
use alloc::collections::VecDeque;
use nalgebra::Vector3;
use tracing::{debug, info, trace};

/// Gyroscope bias calibrator
///
/// Watches a rolling window of angular-velocity magnitudes. While the window
/// is full, its variance stays below the stillness threshold and the rate
/// stays below `max_rate`, raw samples are accumulated per axis. After
/// `min_duration` seconds of uninterrupted stillness their mean is frozen as
/// the bias and subtracted from every later sample. Motion before that
/// discards the accumulation.
#[derive(Debug, Clone)]
pub struct GyroscopeCalibrator {
    settings: CalibrationSettings,
    /// Recent angular-velocity magnitudes
    magnitudes: VecDeque<f32>,
    /// Timestamp of the first sample of the current still period
    still_since: Option<u64>,
    /// Sum of raw samples over the current still period
    bias_sum: Vector3<f32>,
    /// Number of samples in `bias_sum`
    sample_count: u32,
    /// Committed bias estimate in rad/s
    bias: Vector3<f32>,
    calibrated: bool,
}

impl GyroscopeCalibrator {
    /// Create a calibrator with the given settings
    ///
    /// # Example
    /// ```
    /// use orientation_fusion::{CalibrationSettings, GyroscopeCalibrator};
    ///
    /// let calibrator = GyroscopeCalibrator::new(CalibrationSettings::default());
    /// assert!(!calibrator.is_calibrated());
    /// ```
    pub fn new(settings: CalibrationSettings) -> Self {
        let window = settings.window.max(2);
        Self {
            settings: CalibrationSettings { window, ..settings },
            magnitudes: VecDeque::with_capacity(window + 1),
            still_since: None,
            bias_sum: Vector3::zeros(),
            sample_count: 0,
            bias: Vector3::zeros(),
            calibrated: false,
        }
    }

    /// Feed a raw gyroscope sample and return it with the bias removed
    ///
    /// # Arguments
    /// * `gyroscope` - Raw angular velocity in rad/s
    /// * `timestamp` - Sample time in nanoseconds
    ///
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use orientation_fusion::{CalibrationSettings, GyroscopeCalibrator};
    ///
    /// let mut calibrator = GyroscopeCalibrator::new(CalibrationSettings::default());
    /// let raw = Vector3::new(0.01, -0.02, 0.005);
    /// let corrected = calibrator.update(raw, 0);
    /// assert_eq!(corrected, raw); // No bias committed yet
    /// ```
    pub fn update(&mut self, gyroscope: Vector3<f32>, timestamp: u64) -> Vector3<f32> {
        if !self.calibrated {
            self.detect_stillness(gyroscope, timestamp);
        }
        gyroscope - self.bias
    }

    /// Committed bias estimate, zero until calibration completes
    pub fn bias(&self) -> Vector3<f32> {
        self.bias
    }

    /// Whether a bias estimate has been committed
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Whether the device is currently considered still and samples are being accumulated
    pub fn is_accumulating(&self) -> bool {
        self.still_since.is_some()
    }

    /// Current settings
    pub fn settings(&self) -> CalibrationSettings {
        self.settings
    }

    /// Discard the committed bias and start detecting stillness again
    pub fn recalibrate(&mut self) {
        self.magnitudes.clear();
        self.restart_accumulation();
        self.bias = Vector3::zeros();
        self.calibrated = false;
        info!("gyroscope recalibration started");
    }

    /// Drop the magnitude window and any uncommitted accumulation
    ///
    /// A committed bias is kept.
    pub(crate) fn restart(&mut self) {
        if self.still_since.is_some() {
            debug!(samples = self.sample_count, "bias accumulation interrupted");
        }
        self.magnitudes.clear();
        self.restart_accumulation();
    }

    fn detect_stillness(&mut self, gyroscope: Vector3<f32>, timestamp: u64) {
        let magnitude = gyroscope.norm();
        self.magnitudes.push_back(magnitude);
        if self.magnitudes.len() > self.settings.window {
            self.magnitudes.pop_front();
        }

        let still = self.magnitudes.len() >= self.settings.window
            && magnitude <= self.settings.max_rate
            && self.magnitude_variance() <= self.settings.variance_threshold;

        if !still {
            if self.still_since.is_some() {
                trace!(
                    samples = self.sample_count,
                    "motion detected, bias accumulation discarded"
                );
            }
            self.restart_accumulation();
            return;
        }

        let start = *self.still_since.get_or_insert(timestamp);
        self.bias_sum += gyroscope;
        self.sample_count += 1;

        if elapsed_seconds(start, timestamp) >= self.settings.min_duration {
            self.bias = self.bias_sum / self.sample_count as f32;
            self.calibrated = true;
            info!(
                bias_x = self.bias.x,
                bias_y = self.bias.y,
                bias_z = self.bias.z,
                samples = self.sample_count,
                "gyroscope calibration complete"
            );
        }
    }

    /// Population variance of the magnitude window
    fn magnitude_variance(&self) -> f32 {
        let count = self.magnitudes.len() as f32;
        let mean = self.magnitudes.iter().sum::<f32>() / count;
        self.magnitudes
            .iter()
            .map(|magnitude| (magnitude - mean) * (magnitude - mean))
            .sum::<f32>()
            / count
    }

    fn restart_accumulation(&mut self) {
        self.still_since = None;
        self.bias_sum = Vector3::zeros();
        self.sample_count = 0;
    }
}

impl Default for GyroscopeCalibrator {
    fn default() -> Self {
        Self::new(CalibrationSettings::default())
    }
}
