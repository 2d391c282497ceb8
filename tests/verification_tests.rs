use nalgebra::{UnitQuaternion, Vector3};
use orientation_fusion::{
    FusionEngine, FusionError, FusionSettings, FusionState, SensorKind, Strategy,
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

const PERIOD_NS: u64 = 10_000_000; // 100 Hz
const TOLERANCE: f32 = 2e-3;

const ALL_STRATEGIES: [Strategy; 4] = [
    Strategy::OrientationVector,
    Strategy::RotationMatrix,
    Strategy::Quaternion,
    Strategy::Kalman,
];

const COMPLEMENTARY_STRATEGIES: [Strategy; 3] = [
    Strategy::OrientationVector,
    Strategy::RotationMatrix,
    Strategy::Quaternion,
];

fn gravity() -> Vector3<f32> {
    Vector3::new(0.0, 0.0, 9.81)
}

/// Field seen by a level device whose top points north
fn field_north() -> Vector3<f32> {
    Vector3::new(0.0, 22.0, -42.0)
}

/// Field seen by a level device whose top points east
fn field_east() -> Vector3<f32> {
    Vector3::new(-22.0, 0.0, -42.0)
}

fn settings_for(strategy: Strategy, coefficient: f32) -> FusionSettings {
    FusionSettings {
        strategy,
        orientation_coefficient: coefficient,
        rotation_matrix_coefficient: coefficient,
        quaternion_coefficient: coefficient,
        ..Default::default()
    }
}

fn start_tracking(settings: FusionSettings, magnetic: Vector3<f32>) -> FusionEngine {
    let mut engine = FusionEngine::with_settings(settings);
    engine.on_sensor_sample(SensorKind::Accelerometer, gravity(), 0).unwrap();
    engine.on_sensor_sample(SensorKind::Magnetometer, magnetic, 0).unwrap();
    assert_eq!(engine.state(), FusionState::Tracking);
    engine
}

/// Feed `steps + 1` gyroscope samples starting at `start`, returning the next timestamp
fn feed_gyroscope(engine: &mut FusionEngine, rate: Vector3<f32>, start: u64, steps: u64) -> u64 {
    for step in 0..=steps {
        engine
            .on_sensor_sample(SensorKind::Gyroscope, rate, start + step * PERIOD_NS)
            .unwrap();
    }
    start + (steps + 1) * PERIOD_NS
}

/// Zero rotation rate for one second with a fixed absolute orientation converges to it
#[test]
fn test_stationary_converges_to_absolute() {
    for strategy in ALL_STRATEGIES {
        let mut engine = start_tracking(settings_for(strategy, 0.9), field_east());
        assert!((engine.heading() - 90.0).abs() < 0.01, "{strategy:?}");

        // Device turned to face north while the gyroscope saw nothing
        engine
            .on_sensor_sample(SensorKind::Magnetometer, field_north(), 0)
            .unwrap();
        feed_gyroscope(&mut engine, Vector3::zeros(), 0, 100);

        let absolute = engine.absolute_orientation().unwrap();
        let error = engine.quaternion().angle_to(&absolute.quaternion);
        assert!(error < TOLERANCE, "{strategy:?} error {error}");
        assert!(engine.orientation().norm() < TOLERANCE, "{strategy:?}");
    }
}

/// π/2 rad/s for one second with α = 1 turns a quarter about the rotation axis
#[test]
fn test_pure_gyroscope_rotation() {
    for strategy in COMPLEMENTARY_STRATEGIES {
        let mut engine = start_tracking(settings_for(strategy, 1.0), field_north());
        feed_gyroscope(&mut engine, Vector3::new(0.0, 0.0, FRAC_PI_2), 0, 100);

        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let error = engine.quaternion().angle_to(&expected);
        assert!(error < TOLERANCE, "{strategy:?} error {error}");

        // Rotating counter-clockwise about up turns the device toward west
        let heading = engine.heading();
        assert!((heading - 270.0).abs() < 0.2, "{strategy:?} heading {heading}");
    }
}

/// Rotation about the device x axis tilts the top edge up
#[test]
fn test_pure_gyroscope_rotation_tilted_axis() {
    let axis = Vector3::new(1.0, 0.0, 0.0);
    for strategy in COMPLEMENTARY_STRATEGIES {
        let mut engine = start_tracking(settings_for(strategy, 1.0), field_north());
        feed_gyroscope(&mut engine, axis * FRAC_PI_4, 0, 100);

        let expected = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_4);
        let error = engine.quaternion().angle_to(&expected);
        assert!(error < TOLERANCE, "{strategy:?} error {error}");
        // Raising the top edge is a negative pitch
        assert!((engine.orientation().y + FRAC_PI_4).abs() < TOLERANCE, "{strategy:?}");
    }
}

/// Stationary for the minimum duration estimates the bias, then drift stays near zero
#[test]
fn test_bias_calibration_removes_drift() {
    let bias = Vector3::new(0.03, -0.02, 0.04);
    let mut rng = Pcg64::seed_from_u64(42);
    let mut engine = start_tracking(settings_for(Strategy::Quaternion, 1.0), field_north());

    let mut timestamp = 0;
    let noisy_bias = |rng: &mut Pcg64| {
        bias + Vector3::new(
            rng.random_range(-0.001..0.001),
            rng.random_range(-0.001..0.001),
            rng.random_range(-0.001..0.001),
        )
    };

    // Window fill plus the minimum still duration, with margin
    for _ in 0..300 {
        engine
            .on_sensor_sample(SensorKind::Gyroscope, noisy_bias(&mut rng), timestamp)
            .unwrap();
        timestamp += PERIOD_NS;
        if engine.is_calibrated() {
            break;
        }
    }
    assert!(engine.is_calibrated());

    let estimate = engine.gyroscope_bias();
    for axis in 0..3 {
        let relative = ((estimate[axis] - bias[axis]) / bias[axis]).abs();
        assert!(relative < 0.05, "axis {axis}: {} vs {}", estimate[axis], bias[axis]);
    }

    // Ten seconds of the same still signal
    let start = engine.quaternion();
    for _ in 0..1000 {
        engine
            .on_sensor_sample(SensorKind::Gyroscope, noisy_bias(&mut rng), timestamp)
            .unwrap();
        timestamp += PERIOD_NS;
    }
    let drift = engine.quaternion().angle_to(&start);
    assert!(drift < 0.01, "drift {drift} rad");
}

#[test]
fn test_uncalibrated_bias_drifts() {
    let bias = Vector3::new(0.03, -0.02, 0.04);
    let mut settings = settings_for(Strategy::Quaternion, 1.0);
    settings.calibration.enabled = false;
    let mut engine = start_tracking(settings, field_north());

    feed_gyroscope(&mut engine, bias, 0, 1000);
    let drift = engine.quaternion().angle();
    assert!((drift - bias.norm() * 10.0).abs() < 0.01, "drift {drift} rad");
    assert_eq!(engine.gyroscope_bias(), Vector3::zeros());
}

/// An out-of-range coefficient is replaced by 0.5 and reported
#[test]
fn test_invalid_coefficient_uses_default() {
    for strategy in COMPLEMENTARY_STRATEGIES {
        let engine = FusionEngine::with_settings(settings_for(strategy, 1.5));
        assert_eq!(engine.coefficient(), 0.5, "{strategy:?}");

        let mut engine = FusionEngine::new();
        let result = engine.set_settings(settings_for(strategy, 1.5));
        assert_eq!(result, Err(FusionError::InvalidCoefficient { value: 1.5 }));
        assert_eq!(engine.coefficient(), 0.5, "{strategy:?}");
        assert_eq!(engine.settings().strategy, strategy);
    }

    let mut engine = FusionEngine::new();
    assert!(engine.set_settings(settings_for(Strategy::Quaternion, 0.0)).is_err());
    assert_eq!(engine.coefficient(), 0.5);
}

/// A field parallel to gravity is rejected and the previous orientation survives
#[test]
fn test_degenerate_field_keeps_orientation() {
    for strategy in ALL_STRATEGIES {
        let mut engine = start_tracking(settings_for(strategy, 0.9), field_east());
        let next = feed_gyroscope(&mut engine, Vector3::zeros(), 0, 10);
        let orientation = engine.orientation();
        let absolute = engine.absolute_orientation();

        let result = engine.on_sensor_sample(
            SensorKind::Magnetometer,
            Vector3::new(0.0, 0.0, -40.0),
            next,
        );
        assert_eq!(result, Err(FusionError::DegenerateVector), "{strategy:?}");
        assert_eq!(engine.orientation(), orientation);
        assert_eq!(engine.absolute_orientation(), absolute);

        // Fusion carries on against the last valid absolute orientation
        feed_gyroscope(&mut engine, Vector3::zeros(), next, 10);
        assert!(engine.orientation().iter().all(|angle| angle.is_finite()));
        assert!((engine.heading() - 90.0).abs() < 0.1, "{strategy:?}");
    }
}

#[test]
fn test_zero_gravity_is_degenerate() {
    let mut engine = FusionEngine::new();
    engine
        .on_sensor_sample(SensorKind::Magnetometer, field_north(), 0)
        .unwrap();
    let result = engine.on_sensor_sample(SensorKind::Accelerometer, Vector3::zeros(), 0);
    assert_eq!(result, Err(FusionError::DegenerateVector));
    assert_eq!(engine.state(), FusionState::Uninitialized);
}

/// Noisy sensors around a tilted, rotated pose: every strategy settles near the truth
#[test]
fn test_noisy_sensors_track_true_orientation() {
    let truth = UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1);
    let acceleration = truth.inverse() * gravity();
    let magnetic = truth.inverse() * field_north();

    for strategy in ALL_STRATEGIES {
        let mut rng = Pcg64::seed_from_u64(3);
        let mut engine = FusionEngine::with_settings(settings_for(strategy, 0.95));

        let mut timestamp = 0;
        for _ in 0..500 {
            let noise = Vector3::new(
                rng.random_range(-0.05..0.05),
                rng.random_range(-0.05..0.05),
                rng.random_range(-0.05..0.05),
            );
            engine
                .on_sensor_sample(SensorKind::Accelerometer, acceleration + noise, timestamp)
                .unwrap();
            engine
                .on_sensor_sample(SensorKind::Magnetometer, magnetic + noise * 10.0, timestamp)
                .unwrap();
            engine
                .on_sensor_sample(SensorKind::Gyroscope, noise * 0.1, timestamp)
                .unwrap();
            timestamp += PERIOD_NS;
        }

        let error = engine.quaternion().angle_to(&truth);
        assert!(error < 0.05, "{strategy:?} error {error}");
    }
}

#[test]
fn test_lifecycle() {
    let mut engine = start_tracking(FusionSettings::default(), field_north());

    engine.pause();
    assert!(engine.on_sensor_sample(SensorKind::Gyroscope, Vector3::zeros(), 0).is_ok());
    engine.resume();
    assert_eq!(engine.state(), FusionState::Tracking);

    engine.reset();
    assert_eq!(engine.state(), FusionState::Uninitialized);
    assert!(!engine.is_calibrated());

    engine
        .on_sensor_sample(SensorKind::Gravity, gravity(), 0)
        .unwrap();
    engine
        .on_sensor_sample(SensorKind::Magnetometer, field_east(), 0)
        .unwrap();
    assert_eq!(engine.state(), FusionState::Tracking);
    assert!((engine.heading() - 90.0).abs() < 0.01);
}
