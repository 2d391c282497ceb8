//! Error kinds reported by the fusion pipeline
//!
//! None of these are fatal. Every operation that fails leaves the previous
//! orientation estimate untouched, so a caller may log the error and keep
//! feeding samples.

use thiserror::Error;

/// Errors produced while updating an orientation estimate
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FusionError {
    /// A vector was too short to normalize, or two vectors were parallel
    /// so their cross product vanished
    #[error("degenerate vector: magnitude below tolerance or inputs parallel")]
    DegenerateVector,

    /// A blend coefficient outside (0, 1] was configured and replaced by the default
    #[error("invalid filter coefficient {value}: must be greater than 0 and at most 1")]
    InvalidCoefficient { value: f32 },

    /// The time between two gyroscope samples was zero, negative or not finite
    #[error("invalid time step {delta_time} s: samples must advance in time")]
    InvalidTimeStep { delta_time: f32 },

    /// The innovation covariance of the Kalman filter could not be inverted
    #[error("innovation covariance is singular")]
    SingularCovariance,
}
