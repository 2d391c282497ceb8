//! Simple orientation fusion demonstration
//!
//! Simulates a level device turning slowly about the vertical axis and prints
//! the heading estimated by every strategy.
//!
//! Run with: `RUST_LOG=orientation_fusion=debug cargo run --example simple`

use nalgebra::{UnitQuaternion, Vector3};
use orientation_fusion::{FusionEngine, FusionSettings, SensorKind, Strategy};

const SAMPLE_PERIOD_NS: u64 = 10_000_000; // 10 ms sample period
const TURN_RATE: f32 = 0.2; // rad/s about the vertical axis

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orientation_fusion=info".into()),
        )
        .init();

    let strategies = [
        Strategy::OrientationVector,
        Strategy::RotationMatrix,
        Strategy::Quaternion,
        Strategy::Kalman,
    ];

    for strategy in strategies {
        let mut engine = FusionEngine::with_settings(FusionSettings {
            strategy,
            orientation_coefficient: 0.98,
            rotation_matrix_coefficient: 0.98,
            quaternion_coefficient: 0.98,
            ..Default::default()
        });

        for step in 0..500u64 {
            // this loop should run each time new sensor data is available
            let time = step as f32 * 0.01;
            let pose = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), TURN_RATE * time);
            let timestamp = step * SAMPLE_PERIOD_NS;

            // replace these with actual sensor readings
            let accelerometer = pose.inverse() * Vector3::new(0.0, 0.0, 9.81); // m/s²
            let magnetometer = pose.inverse() * Vector3::new(0.0, 22.0, -42.0); // µT
            let gyroscope = Vector3::new(0.0, 0.0, TURN_RATE); // rad/s

            let samples = [
                (SensorKind::Accelerometer, accelerometer),
                (SensorKind::Magnetometer, magnetometer),
                (SensorKind::Gyroscope, gyroscope),
            ];
            for (kind, values) in samples {
                if let Err(error) = engine.on_sensor_sample(kind, values, timestamp) {
                    eprintln!("{kind:?} sample skipped: {error}");
                }
            }

            if step % 100 == 0 {
                let orientation = engine.orientation();
                println!(
                    "{:?} t={:.1}s Heading: {:.2}, Pitch: {:.2}, Roll: {:.2}",
                    strategy,
                    time,
                    engine.heading(),
                    orientation.y.to_degrees(),
                    orientation.z.to_degrees()
                );
            }
        }
    }
}
