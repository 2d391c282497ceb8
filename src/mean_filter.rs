//! Sliding-window mean filters

use crate::math::{angle_difference, wrap_angle};
use alloc::collections::VecDeque;
use core::f32::consts::TAU;
use nalgebra::Vector3;

/// Arithmetic mean over the last `window` samples of one channel
///
/// Keeps a running sum so every update is O(1). The sum is rebuilt from the
/// buffer once per window length to stop rounding error from accumulating.
///
/// # Example
/// ```
/// use orientation_fusion::MeanFilter;
///
/// let mut filter = MeanFilter::new(3);
/// assert_eq!(filter.add_value(3.0), 3.0);
/// assert_eq!(filter.add_value(6.0), 4.5);
/// assert_eq!(filter.add_value(9.0), 6.0);
/// assert_eq!(filter.add_value(12.0), 9.0); // 3.0 evicted
/// ```
#[derive(Debug, Clone)]
pub struct MeanFilter {
    window: usize,
    samples: VecDeque<f32>,
    sum: f32,
    evictions: usize,
}

impl MeanFilter {
    /// Create a filter averaging `window` samples; a window of 0 acts as 1
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window + 1),
            sum: 0.0,
            evictions: 0,
        }
    }

    /// Add a sample and return the mean of the current window
    pub fn add_value(&mut self, value: f32) -> f32 {
        self.samples.push_back(value);
        self.sum += value;

        if self.samples.len() > self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
            self.evictions += 1;
            if self.evictions >= self.window {
                self.evictions = 0;
                self.sum = self.samples.iter().sum();
            }
        }

        self.mean()
    }

    /// Mean of the current window, 0 when empty
    pub fn mean(&self) -> f32 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f32
        }
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been added since creation or reset
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Configured window length
    pub fn window(&self) -> usize {
        self.window
    }

    /// Add `offset` to every held sample
    pub(crate) fn shift(&mut self, offset: f32) {
        self.samples.iter_mut().for_each(|sample| *sample += offset);
        self.sum = self.samples.iter().sum();
        self.evictions = 0;
    }

    /// Drop every sample
    pub fn reset(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
        self.evictions = 0;
    }
}

/// Three independent [`MeanFilter`] channels
#[derive(Debug, Clone)]
pub struct VectorMeanFilter {
    channels: [MeanFilter; 3],
}

impl VectorMeanFilter {
    pub fn new(window: usize) -> Self {
        Self {
            channels: [
                MeanFilter::new(window),
                MeanFilter::new(window),
                MeanFilter::new(window),
            ],
        }
    }

    /// Add a sample and return the per-axis mean
    pub fn add_vector(&mut self, value: Vector3<f32>) -> Vector3<f32> {
        Vector3::new(
            self.channels[0].add_value(value.x),
            self.channels[1].add_value(value.y),
            self.channels[2].add_value(value.z),
        )
    }

    pub(crate) fn shift(&mut self, offset: Vector3<f32>) {
        for (channel, offset) in self.channels.iter_mut().zip(offset.iter()) {
            if *offset != 0.0 {
                channel.shift(*offset);
            }
        }
    }

    pub fn reset(&mut self) {
        self.channels.iter_mut().for_each(MeanFilter::reset);
    }
}

/// Mean filter for angles in radians
///
/// Angles are unwrapped before averaging so a window straddling ±π
/// averages to a value near ±π instead of near zero. Once an unwrapped
/// channel passes a full turn it is moved back by whole turns, together
/// with its window, so precision holds under continuous rotation.
#[derive(Debug, Clone)]
pub struct AngularMeanFilter {
    filter: VectorMeanFilter,
    previous: Option<Vector3<f32>>,
    unwrapped: Vector3<f32>,
}

impl AngularMeanFilter {
    pub fn new(window: usize) -> Self {
        Self {
            filter: VectorMeanFilter::new(window),
            previous: None,
            unwrapped: Vector3::zeros(),
        }
    }

    /// Add angles and return their wrapped mean
    pub fn add_angles(&mut self, angles: Vector3<f32>) -> Vector3<f32> {
        self.unwrapped = match self.previous {
            Some(previous) => {
                self.unwrapped + previous.zip_map(&angles, |from, to| angle_difference(to, from))
            }
            None => angles,
        };
        self.previous = Some(angles);

        let offset = self
            .unwrapped
            .map(|angle| if angle.abs() > TAU { wrap_angle(angle) - angle } else { 0.0 });
        if offset != Vector3::zeros() {
            self.unwrapped += offset;
            self.filter.shift(offset);
        }

        self.filter.add_vector(self.unwrapped).map(wrap_angle)
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.previous = None;
        self.unwrapped = Vector3::zeros();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    #[test]
    fn test_window_of_one_passes_through() {
        let mut filter = MeanFilter::new(1);
        for value in [1.0, -4.0, 7.5] {
            assert_eq!(filter.add_value(value), value);
        }

        let mut zero = MeanFilter::new(0);
        assert_eq!(zero.window(), 1);
        assert_eq!(zero.add_value(2.0), 2.0);
    }

    #[test]
    fn test_partial_window_averages_available_samples() {
        let mut filter = MeanFilter::new(10);
        filter.add_value(1.0);
        filter.add_value(2.0);
        assert_eq!(filter.add_value(3.0), 2.0);
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn test_window_capacity_is_bounded() {
        let mut filter = MeanFilter::new(4);
        for i in 0..100 {
            filter.add_value(i as f32);
        }
        assert_eq!(filter.len(), 4);
        // Mean of 96, 97, 98, 99
        assert!((filter.mean() - 97.5).abs() < 1e-4);
    }

    #[test]
    fn test_running_sum_does_not_drift() {
        let mut filter = MeanFilter::new(5);
        for i in 0..100_000 {
            filter.add_value(if i % 2 == 0 { 1e4 } else { 0.1 });
        }
        for _ in 0..5 {
            filter.add_value(0.25);
        }
        assert!((filter.mean() - 0.25).abs() < 1e-2);
    }

    #[test]
    fn test_reset() {
        let mut filter = MeanFilter::new(3);
        filter.add_value(10.0);
        filter.reset();
        assert!(filter.is_empty());
        assert_eq!(filter.mean(), 0.0);
        assert_eq!(filter.add_value(1.0), 1.0);
    }

    #[test]
    fn test_vector_mean() {
        let mut filter = VectorMeanFilter::new(2);
        filter.add_vector(Vector3::new(1.0, 2.0, 3.0));
        let mean = filter.add_vector(Vector3::new(3.0, 4.0, 5.0));
        assert_eq!(mean, Vector3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_angular_mean_across_seam() {
        let mut filter = AngularMeanFilter::new(2);
        filter.add_angles(Vector3::new(PI - 0.1, 0.0, 0.0));
        let mean = filter.add_angles(Vector3::new(-PI + 0.1, 0.0, 0.0));

        // Plain averaging would give 0
        assert!((mean.x.abs() - PI).abs() < 1e-4, "mean = {}", mean.x);
    }

    #[test]
    fn test_angular_mean_under_continuous_rotation() {
        let mut filter = AngularMeanFilter::new(5);
        let step = 0.3;
        let mut angle = 0.0;

        for count in 0..100_000 {
            angle = wrap_angle(angle + step);
            let mean = filter.add_angles(Vector3::new(angle, -angle, 0.0));

            assert!(filter.unwrapped.iter().all(|value| value.abs() <= TAU));
            if count < 4 {
                continue;
            }
            // Window holds the last five angles
            let expected = wrap_angle(angle - 2.0 * step);
            assert!(angle_difference(mean.x, expected).abs() < 1e-4, "mean = {}", mean.x);
            assert!(angle_difference(mean.y, -expected).abs() < 1e-4, "mean = {}", mean.y);
        }
    }
}
