//! Range estimation tests against closed-form answers.

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4, PI};

use hybrid_rs::config::Configuration;
use hybrid_rs::error::ErrorKind;
use hybrid_rs::estimator::{
    IntervalEstimator, RangeEstimator, SimulationEstimator, SymbolicStatePoint, UnavailableEstimator,
};
use hybrid_rs::generate::debug_configuration;
use hybrid_rs::interval::Interval;

fn sine() -> Configuration {
    debug_configuration(&[["t", "1", "0"], ["y", "sin(t)", "0"]]).unwrap()
}

fn origin() -> SymbolicStatePoint {
    SymbolicStatePoint::new("on", vec![0.0, 0.0])
}

#[test]
fn sine_windows() {
    let windows = [Interval::new(0.0, FRAC_PI_4), Interval::new(0.0, 2.0 * PI)];
    let ranges = SimulationEstimator::default()
        .estimate_range(&sine(), "y", &origin(), &windows)
        .unwrap();
    assert_eq!(ranges.len(), 2);
    assert!(ranges[0].approx_eq(&Interval::new(0.0, FRAC_1_SQRT_2), 1e-3), "{}", ranges[0]);
    assert!(ranges[1].approx_eq(&Interval::new(-1.0, 1.0), 1e-3), "{}", ranges[1]);
}

#[test]
fn simulation_is_idempotent() {
    let config = sine();
    let windows = [Interval::new(0.3, 1.1), Interval::new(1.1, 4.0)];
    let backend = SimulationEstimator::default();
    let first = backend.estimate_range(&config, "y", &origin(), &windows).unwrap();
    for _ in 0..3 {
        assert_eq!(backend.estimate_range(&config, "y", &origin(), &windows).unwrap(), first);
    }
}

#[test]
fn interval_backend_encloses_exact_range() {
    let windows = [Interval::new(0.0, FRAC_PI_4), Interval::new(0.0, 2.0 * PI)];
    let ranges = IntervalEstimator::default()
        .estimate_range(&sine(), "y", &origin(), &windows)
        .unwrap();
    assert!(ranges[0].contains_interval(&Interval::new(0.0, FRAC_1_SQRT_2 - 1e-9)), "{}", ranges[0]);
    assert!(ranges[1].contains_interval(&Interval::new(-1.0 + 1e-9, 1.0 - 1e-9)), "{}", ranges[1]);
}

#[test]
fn backend_errors() {
    let config = sine();
    let windows = [Interval::new(0.0, 1.0)];

    let err = UnavailableEstimator::new("offline")
        .estimate_range(&config, "y", &origin(), &windows)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
    assert!(err.to_string().contains("offline"), "{}", err);

    let missing = SymbolicStatePoint::new("off", vec![0.0, 0.0]);
    assert!(SimulationEstimator::default()
        .estimate_range(&config, "y", &missing, &windows)
        .is_err());

    let err = SimulationEstimator::default()
        .estimate_range(&config, "y", &origin(), &[Interval::new(-1.0, 1.0)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
}
