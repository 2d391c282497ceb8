#![no_std]

//! Orientation fusion - real-time device orientation from motion sensors
//!
//! Fuses gyroscope, accelerometer (or platform gravity) and magnetometer
//! samples into a device-to-world orientation in the east-north-up frame.
//! The gyroscope is smooth but drifts; the accelerometer and magnetometer are
//! drift-free but noisy. Each strategy combines the two:
//!
//! - Complementary filter over orientation angles
//! - Complementary filter over rotation matrices
//! - Complementary filter over quaternions (SLERP)
//! - Quaternion Kalman filter
//!
//! Gyroscope bias is estimated while the device is still, and the output can
//! be smoothed with a sliding-window mean filter.
//!
//! # Features
//!
//! - Sample-driven engine with explicit timestamps in nanoseconds
//! - Stillness-gated gyroscope bias calibration
//! - Pause and resume without integrating across the gap
//! - `#![no_std]` compatible (requires `alloc`)
//! - Optional `serde` support for the settings types
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use orientation_fusion::{FusionEngine, FusionSettings, SensorKind, Strategy};
//!
//! let mut engine = FusionEngine::with_settings(FusionSettings {
//!     strategy: Strategy::Quaternion,
//!     quaternion_coefficient: 0.98,
//!     ..Default::default()
//! });
//!
//! // Sensor readings, timestamps in nanoseconds
//! let acceleration = Vector3::new(0.0, 0.0, 9.81);  // m/s²
//! let magnetic = Vector3::new(0.0, 22.0, -42.0);    // µT
//! let gyroscope = Vector3::new(0.0, 0.0, 0.1);      // rad/s
//!
//! engine.on_sensor_sample(SensorKind::Accelerometer, acceleration, 0).unwrap();
//! engine.on_sensor_sample(SensorKind::Magnetometer, magnetic, 0).unwrap();
//! for step in 0..100 {
//!     engine.on_sensor_sample(SensorKind::Gyroscope, gyroscope, step * 10_000_000).unwrap();
//! }
//!
//! // [azimuth, pitch, roll] in radians
//! let orientation = engine.orientation();
//! let heading = engine.heading(); // degrees
//! ```

extern crate alloc;

pub mod absolute;
pub mod calibration;
pub mod complementary;
pub mod engine;
mod error;
pub mod integrator;
pub mod kalman;
pub mod math;
pub mod mean_filter;
mod types;

// Re-export all public types
pub use absolute::{AbsoluteOrientation, AbsoluteOrientationEstimator};
pub use calibration::GyroscopeCalibrator;
pub use complementary::ComplementaryFilter;
pub use engine::FusionEngine;
pub use error::FusionError;
pub use integrator::GyroscopeIntegrator;
pub use kalman::QuaternionKalmanFilter;
pub use math::{DEG_TO_RAD, QuaternionExt, RAD_TO_DEG, Vector3Ext};
pub use mean_filter::{AngularMeanFilter, MeanFilter, VectorMeanFilter};
pub use types::*;
