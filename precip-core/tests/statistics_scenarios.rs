//! Interval statistics scenarios
//!
//! Drives Statistics directly with synthetic magnitude snapshots and checks
//! the interval-level behaviour: averaging, range correction, dominant-group
//! selection, classification, calibration and reset.

mod common;

use precip_core::{
    classify,
    config::{SensorConfig, ThresholdGranularity},
    model::{BinModel, PrecipitationKind},
    statistics::Statistics,
};

use common::{four_bin_config, generators::{snapshot_with, NoiseGenerator}};

fn setup(config: &SensorConfig) -> (Statistics, BinModel) {
    (
        Statistics::new(config).expect("valid config"),
        BinModel::new(config).expect("valid config"),
    )
}

#[test]
fn single_line_in_bin_two_dominates_upper_group() {
    let config = four_bin_config();
    let (stats, mut model) = setup(&config);

    let snapshot = snapshot_with(4, &[(2, 100.0)]);
    for _ in 0..10 {
        stats.calc(&mut model, &snapshot).unwrap();
    }
    stats.finalize(&mut model);

    let factor = model.range_correction().factor(2);
    let upper = &model.groups()[1];
    assert_eq!(model.dominant_group(), 1);
    assert!(upper.is_dominant);
    assert!(!model.groups()[0].is_dominant);
    assert_eq!(upper.average, 100.0);
    assert_eq!(upper.corrected_average, 100.0 / factor);
    assert_eq!(upper.peak, 100.0);

    // Overall figures average over bins 1..=3 only
    assert!((model.average() - 100.0 / 3.0).abs() < 1e-4);
    assert!((model.corrected_average() - 100.0 / factor / 3.0).abs() < 1e-6);
    assert_eq!(model.snapshot_ctr(), 10);
}

#[test]
fn finalize_without_snapshots_yields_zero() {
    let config = four_bin_config();
    let (stats, mut model) = setup(&config);

    stats.finalize(&mut model);

    assert!(model.bins().iter().all(|b| b.average == 0.0));
    assert!(model.groups().iter().all(|g| g.average == 0.0 && g.corrected_average == 0.0));
    assert_eq!(model.average(), 0.0);
    assert_eq!(model.corrected_average(), 0.0);
    assert!(model.average().is_finite());
    assert_eq!(model.precipitation_amount(), 0.0);
}

#[test]
fn reset_twice_equals_reset_once() {
    let config = four_bin_config().with_amount_factors(vec![1.0, 1.0]).with_rain_groups(1, 1);
    let (stats, mut model) = setup(&config);
    let mut noise = NoiseGenerator::new(7);

    for _ in 0..25 {
        stats.calc(&mut model, &noise.snapshot(4, 500.0)).unwrap();
    }
    stats.calibrate(&mut model);
    stats.finalize(&mut model);
    let thresholds: Vec<f32> = model.groups().iter().map(|g| g.threshold).collect();
    let total = model.precipitation_amount_acc();

    stats.reset(&mut model);
    let once = model.clone();
    stats.reset(&mut model);
    assert_eq!(model, once);

    assert_eq!(model.snapshot_ctr(), 0);
    assert_eq!(model.total_detections(), 0);
    assert!(model.bins().iter().all(|b| b.sum == 0.0 && b.peak == 0.0 && b.detections == 0));
    assert!(model.groups().iter().all(|g| !g.is_dominant && g.weighted_detections == 0.0));
    assert_eq!(model.precipitation(), None);

    let kept: Vec<f32> = model.groups().iter().map(|g| g.threshold).collect();
    assert_eq!(kept, thresholds);
    assert_eq!(model.precipitation_amount_acc(), total);
}

#[test]
fn equal_groups_resolve_to_lower_index() {
    let config = SensorConfig::for_snapshot_len(8)
        .with_group_bounds(vec![1, 3])
        .with_range_correction(vec![1.0, 2.0, 2.0, 1.0]);
    let (stats, mut model) = setup(&config);

    // Both groups end up with a corrected average of 5
    stats.calc(&mut model, &[0.0, 10.0, 10.0, 0.0]).unwrap();
    stats.finalize(&mut model);

    assert_eq!(model.groups()[0].corrected_average, model.groups()[1].corrected_average);
    assert_eq!(model.dominant_group(), 0);
}

#[test]
fn calibration_normalises_against_smallest_peak() {
    let config = four_bin_config().with_granularity(ThresholdGranularity::Bin);
    let (stats, mut model) = setup(&config);

    stats.calc(&mut model, &[10.0, 20.0, 40.0, 0.0]).unwrap();
    let report = stats.calibrate(&mut model);

    let thresholds: Vec<f32> = model.bins().iter().map(|b| b.threshold).collect();
    assert_eq!(thresholds, vec![1.0, 2.0, 4.0, 0.1]);
    assert_eq!(report.thresholds, thresholds);
    assert!(thresholds.iter().all(|t| *t > 0.0));
}

#[test]
fn calibration_per_group_with_one_bin_each() {
    let config = four_bin_config().with_group_bounds(vec![0, 1, 2, 3]);
    let (stats, mut model) = setup(&config);

    stats.calc(&mut model, &[10.0, 20.0, 40.0, 0.0]).unwrap();
    stats.calibrate(&mut model);

    let thresholds: Vec<f32> = model.groups().iter().map(|g| g.threshold).collect();
    assert_eq!(thresholds, vec![1.0, 2.0, 4.0, 0.1]);
}

#[test]
fn classification_boundaries() {
    assert_eq!(classify(6, 7, 23), PrecipitationKind::Snow);
    assert_eq!(classify(7, 7, 23), PrecipitationKind::Rain);
    assert_eq!(classify(23, 7, 23), PrecipitationKind::Rain);
    assert_eq!(classify(24, 7, 23), PrecipitationKind::Hail);
}

#[test]
fn classification_follows_dominant_group_in_full_model() {
    // 512 bins, 32 groups of 16; default rain range 7..=23
    let config = SensorConfig::default().with_range_correction(vec![1.0; 512]);
    let (stats, mut model) = setup(&config);

    for (group, expected) in [
        (6, PrecipitationKind::Snow),
        (7, PrecipitationKind::Rain),
        (23, PrecipitationKind::Rain),
        (24, PrecipitationKind::Hail),
    ] {
        stats.reset(&mut model);
        let bin = group * 16 + 8;
        stats.calc(&mut model, &snapshot_with(512, &[(bin, 50.0)])).unwrap();

        assert_eq!(stats.finalize(&mut model), expected, "group {}", group);
        assert_eq!(model.dominant_group(), group);
        assert_eq!(model.precipitation(), Some(expected));
    }
}

#[test]
fn rain_amount_accumulates_until_reset() {
    let config = four_bin_config()
        .with_range_correction(vec![1.0; 4])
        .with_amount_factors(vec![0.5, 0.25])
        .with_rain_groups(1, 1);
    let (stats, mut model) = setup(&config);

    for _ in 0..3 {
        stats.reset(&mut model);
        stats.calc(&mut model, &[2.0, 0.0, 8.0, 0.0]).unwrap();
        assert_eq!(stats.finalize(&mut model), PrecipitationKind::Rain);
        // 2 × 0.5 + 8 × 0.25
        assert_eq!(model.precipitation_amount(), 3.0);
    }
    assert_eq!(model.precipitation_amount_acc(), 9.0);

    stats.reset_accumulator(&mut model);
    assert_eq!(model.precipitation_amount_acc(), 0.0);

    // Snow adds nothing
    stats.reset(&mut model);
    stats.calc(&mut model, &[9.0, 0.0, 8.0, 0.0]).unwrap();
    assert_eq!(stats.finalize(&mut model), PrecipitationKind::Snow);
    assert_eq!(model.precipitation_amount_acc(), 0.0);
}

#[test]
fn weighted_detections_pick_their_own_dominant_group() {
    let config = four_bin_config()
        .with_range_correction(vec![1.0, 1.0, 4.0, 4.0])
        .with_threshold(1.0, 0.0);
    let (stats, mut model) = setup(&config);

    // Group 0 detects once with weight 1, group 1 twice with weight 1/4
    stats.calc(&mut model, &[0.0, 2.0, 0.0, 0.0]).unwrap();
    stats.calc(&mut model, &[0.0, 0.0, 400.0, 0.0]).unwrap();
    stats.calc(&mut model, &[0.0, 0.0, 0.0, 400.0]).unwrap();
    stats.finalize(&mut model);

    assert_eq!(model.groups()[0].weighted_detections, 1.0);
    assert_eq!(model.groups()[1].weighted_detections, 0.5);
    assert_eq!(model.dominant_group(), 1);
    assert_eq!(model.dominant_group_by_detections(), 0);
    assert!(model.groups()[0].is_dominant_by_detections);
    assert_eq!(model.total_detections(), 3);
}
