//! Rainfall estimation invariants: downscaling conserves water volume, IDW
//! honours sensor values at their own location, and the Kalman filter
//! settles on a repeated measurement.

use approx::assert_relative_eq;
use chrono::Utc;
use landslide_ews_core::core_types::{SensorReading, SourceType, Vec2};
use landslide_ews_core::grid::{FieldData, GridCoords, TerrainGrid};
use landslide_ews_core::rainfall::{
    filter_anomalies, DownscaleConfig, DownscaleMode, IdwConfig, IdwFuser, KalmanConfig,
    KalmanFuser, RainfallDownscaler,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn volume(field: &FieldData, cell_size: f32) -> f64 {
    field.sum() * f64::from(cell_size).powi(2)
}

#[test]
fn test_downscaling_conserves_volume() {
    let mut rng = StdRng::seed_from_u64(7);
    let cases = [
        // (coarse w, coarse h, coarse cell, fine w, fine h, fine cell)
        (5, 4, 1000.0, 50, 40, 100.0),
        (3, 3, 900.0, 27, 27, 100.0),
        (2, 6, 500.0, 21, 61, 50.0),
        (1, 1, 300.0, 10, 10, 30.0),
    ];

    for (cw, ch, cc, fw, fh, fc) in cases {
        let coarse = FieldData::from_fn(cw, ch, |_, _| rng.random_range(0.0..120.0));
        let terrain = TerrainGrid::single_hill(fw, fh, fc, 200.0, 400.0, fc * 8.0).unwrap();
        let fine = RainfallDownscaler::default()
            .downscale_onto(&coarse, &terrain, cc, DownscaleMode::Deterministic)
            .unwrap();

        assert_eq!(fine.dimensions(), (fw, fh));
        assert_relative_eq!(
            volume(&fine, fc),
            volume(&coarse, cc),
            max_relative = 1e-3
        );
    }
}

#[test]
fn test_stochastic_mode_conserves_volume_before_noise() {
    let coarse = FieldData::from_vec(2, 2, vec![4.0, 12.0, 30.0, 7.5]).unwrap();
    let terrain = TerrainGrid::inclined_plane(20, 20, 25.0, 20.0).unwrap();

    let noiseless = RainfallDownscaler::new(DownscaleConfig {
        noise_fraction: 0.0,
        ..DownscaleConfig::default()
    })
    .unwrap();
    let stochastic = noiseless
        .downscale_onto(&coarse, &terrain, 250.0, DownscaleMode::Stochastic { seed: Some(3) })
        .unwrap();
    let deterministic = noiseless
        .downscale_onto(&coarse, &terrain, 250.0, DownscaleMode::Deterministic)
        .unwrap();

    assert_eq!(stochastic, deterministic);
    assert_relative_eq!(
        volume(&stochastic, 25.0),
        volume(&coarse, 250.0),
        max_relative = 1e-3
    );
}

#[test]
fn test_idw_converges_to_sensor_value_at_its_location() {
    let coords = GridCoords::regular(10, 10, 10.0);
    let background = FieldData::new(10, 10);
    let now = Utc::now();
    let sensors = [
        SensorReading::new("ON_CELL", coords.at(3, 4), 42.0, now),
        SensorReading::new("NEAR", Vec2::new(55.0, 42.0), 5.0, now),
        SensorReading::new("FAR", Vec2::new(90.0, 90.0), 100.0, now),
    ];

    let mut last_error = f32::INFINITY;
    for floor in [1e-1, 1e-3, 1e-6, 1e-10] {
        let fuser = IdwFuser::new(IdwConfig {
            min_distance_sq: floor,
            ..IdwConfig::default()
        })
        .unwrap();
        let fused = fuser.fuse(&sensors, &coords, &background, None).unwrap();
        let error = (fused.get(3, 4) - 42.0).abs();
        assert!(
            error <= last_error + 1e-6,
            "error grew from {last_error} to {error} as the floor shrank to {floor}"
        );
        last_error = error;
    }
    assert!(last_error < 1e-4, "residual error {last_error}");
}

#[test]
fn test_idw_with_no_valid_sensors_falls_back_to_background() {
    let coords = GridCoords::regular(6, 5, 100.0);
    let background = FieldData::from_fn(6, 5, |x, y| (x * 2 + y) as f32);
    let now = Utc::now();
    let garbage = [
        SensorReading::new("NEG", Vec2::new(0.0, 0.0), -3.0, now),
        SensorReading::new("HUGE", Vec2::new(100.0, 0.0), 9000.0, now),
    ];

    let valid = filter_anomalies(&garbage).unwrap();
    assert!(valid.is_empty());

    let fused = IdwFuser::default()
        .fuse(&valid, &coords, &background, None)
        .unwrap();
    assert_eq!(fused, background);
}

#[test]
fn test_kalman_converges_on_constant_measurement() {
    let config = KalmanConfig::default();
    let mut kf = KalmanFuser::new(4, 3, config).unwrap();
    let z = FieldData::with_value(4, 3, 12.0);

    let mut last_x = kf.estimate().get(2, 1);
    let mut last_p = kf.variance().get(2, 1);
    for step in 0..40 {
        kf.update(&z, SourceType::Satellite).unwrap();
        let x = kf.estimate().get(2, 1);
        let p = kf.variance().get(2, 1);

        assert!(
            x >= last_x - 1e-5 && x <= 12.0 + 1e-4,
            "step {step}: x moved from {last_x} to {x}"
        );
        if step < 8 {
            assert!(p < last_p, "step {step}: P did not decrease ({last_p} -> {p})");
        } else {
            assert!(p <= last_p + 1e-6, "step {step}: P increased ({last_p} -> {p})");
        }
        last_x = x;
        last_p = p;
    }

    assert_relative_eq!(last_x, 12.0, epsilon = 1e-3);
    assert_relative_eq!(
        last_p,
        config.steady_state_variance(SourceType::Satellite),
        epsilon = 1e-4
    );
}
