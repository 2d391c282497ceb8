use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra::{UnitQuaternion, Vector3};
use orientation_fusion::math::{matrix_to_quaternion, orthonormalize, quaternion_to_matrix, slerp};
use orientation_fusion::{
    AbsoluteOrientation, FusionEngine, FusionSettings, GyroscopeCalibrator, MeanFilter,
    SensorKind, Strategy,
};
use rand::prelude::*;
use rand_pcg::Pcg64;
use std::f32::consts::PI;

const PERIOD_NS: u64 = 10_000_000; // 100 Hz

// Pre-generated sensor data to eliminate RNG overhead during benchmarks
struct PreGeneratedData {
    samples: Vec<(Vector3<f32>, Vector3<f32>, Vector3<f32>)>,
    index: usize,
}

impl PreGeneratedData {
    fn new(count: usize, seed: u64) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut samples = Vec::with_capacity(count);

        for i in 0..count {
            let time = i as f32 * 0.01; // 100Hz sample rate
            let motion_phase = time * 0.5 * 2.0 * PI;
            let pose = UnitQuaternion::from_euler_angles(
                0.1 * motion_phase.sin(),
                0.1 * motion_phase.cos(),
                0.5 * motion_phase,
            );

            let gyroscope = Vector3::new(
                0.2 * motion_phase.sin() + rng.random_range(-0.01..0.01),
                0.2 * (motion_phase * 1.3).cos() + rng.random_range(-0.01..0.01),
                0.2 * (motion_phase * 0.7).sin() + rng.random_range(-0.01..0.01),
            );
            let accelerometer = pose.inverse() * Vector3::new(0.0, 0.0, 9.81)
                + Vector3::new(
                    rng.random_range(-0.02..0.02),
                    rng.random_range(-0.02..0.02),
                    rng.random_range(-0.02..0.02),
                );
            let magnetometer = pose.inverse() * Vector3::new(0.0, 22.0, -42.0)
                + Vector3::new(
                    rng.random_range(-0.5..0.5),
                    rng.random_range(-0.5..0.5),
                    rng.random_range(-0.5..0.5),
                );

            samples.push((gyroscope, accelerometer, magnetometer));
        }

        Self { samples, index: 0 }
    }

    fn next(&mut self) -> (Vector3<f32>, Vector3<f32>, Vector3<f32>) {
        let sample = self.samples[self.index];
        self.index = (self.index + 1) % self.samples.len();
        sample
    }
}

fn tracking_engine(strategy: Strategy) -> FusionEngine {
    let mut engine = FusionEngine::with_settings(FusionSettings {
        strategy,
        ..Default::default()
    });
    let _ = engine.on_sensor_sample(SensorKind::Accelerometer, Vector3::new(0.0, 0.0, 9.81), 0);
    let _ = engine.on_sensor_sample(SensorKind::Magnetometer, Vector3::new(0.0, 22.0, -42.0), 0);
    engine
}

/// Benchmark one full sample triple (accelerometer, magnetometer, gyroscope) per strategy
fn bench_engine_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_update");

    for (name, strategy) in [
        ("orientation_vector", Strategy::OrientationVector),
        ("rotation_matrix", Strategy::RotationMatrix),
        ("quaternion", Strategy::Quaternion),
        ("kalman", Strategy::Kalman),
    ] {
        let mut engine = tracking_engine(strategy);
        let mut data = PreGeneratedData::new(1000, 42);
        let mut timestamp = 0;

        group.bench_function(name, |b| {
            b.iter(|| {
                let (gyroscope, accelerometer, magnetometer) = data.next();
                timestamp += PERIOD_NS;
                let _ = engine.on_sensor_sample(
                    SensorKind::Accelerometer,
                    black_box(accelerometer),
                    timestamp,
                );
                let _ = engine.on_sensor_sample(
                    SensorKind::Magnetometer,
                    black_box(magnetometer),
                    timestamp,
                );
                let _ = engine.on_sensor_sample(
                    SensorKind::Gyroscope,
                    black_box(gyroscope),
                    timestamp,
                );
            })
        });
    }

    group.finish();
}

/// Benchmark the absolute orientation from gravity and field
fn bench_absolute_orientation(c: &mut Criterion) {
    let acceleration = Vector3::new(0.3, -0.2, 9.8);
    let magnetic = Vector3::new(5.0, 21.0, -42.0);

    c.bench_function("absolute_orientation", |b| {
        b.iter(|| AbsoluteOrientation::from_vectors(black_box(acceleration), black_box(magnetic)))
    });
}

/// Benchmark gyroscope calibration on a still device
fn bench_calibrator(c: &mut Criterion) {
    let mut calibrator = GyroscopeCalibrator::default();
    let mut timestamp = 0;

    c.bench_function("gyroscope_calibrator", |b| {
        b.iter(|| {
            timestamp += PERIOD_NS;
            calibrator.update(black_box(Vector3::new(0.01, -0.02, 0.005)), timestamp)
        })
    });
}

/// Benchmark the running mean
fn bench_mean_filter(c: &mut Criterion) {
    let mut filter = MeanFilter::new(30);
    let mut value = 0.0f32;

    c.bench_function("mean_filter_30", |b| {
        b.iter(|| {
            value += 0.1;
            filter.add_value(black_box(value))
        })
    });
}

/// Benchmark the math primitives used on every update
fn bench_math(c: &mut Criterion) {
    let from = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
    let to = UnitQuaternion::from_euler_angles(-0.4, 0.5, 1.3);
    let matrix = quaternion_to_matrix(&to);

    c.bench_function("slerp", |b| {
        b.iter(|| slerp(black_box(&from), black_box(&to), black_box(0.02)))
    });
    c.bench_function("matrix_to_quaternion", |b| {
        b.iter(|| matrix_to_quaternion(black_box(&matrix)))
    });
    c.bench_function("orthonormalize", |b| b.iter(|| orthonormalize(black_box(&matrix))));
}

criterion_group!(
    benches,
    bench_engine_update,
    bench_absolute_orientation,
    bench_calibrator,
    bench_mean_filter,
    bench_math
);

criterion_main!(benches);
