//! Tests for SimTime
//!
//! Simulated time is integer nanoseconds; these cover conversions at the
//! seconds boundary used by configuration and reports.

use combat_simulator_core_rs::SimTime;

#[test]
fn test_constructors_agree() {
    assert_eq!(SimTime::from_secs(2), SimTime::from_millis(2_000));
    assert_eq!(SimTime::from_millis(1), SimTime::from_nanos(1_000_000));
    assert_eq!(SimTime::from_secs_f64(1.5), SimTime::from_millis(1_500));
}

#[test]
fn test_from_secs_f64_rounds_to_nearest_nano() {
    assert_eq!(SimTime::from_secs_f64(1e-9 * 0.6).as_nanos(), 1);
    assert_eq!(SimTime::from_secs_f64(1e-9 * 0.4).as_nanos(), 0);
}

#[test]
fn test_non_finite_seconds_saturate() {
    assert_eq!(SimTime::from_secs_f64(f64::NAN), SimTime::ZERO);
    assert_eq!(SimTime::from_secs_f64(f64::INFINITY), SimTime::MAX);
    assert_eq!(SimTime::from_secs_f64(f64::NEG_INFINITY), SimTime::MIN);
}

#[test]
fn test_arithmetic() {
    let a = SimTime::from_secs(3);
    let b = SimTime::from_millis(500);

    assert_eq!(a + b, SimTime::from_millis(3_500));
    assert_eq!(a - b, SimTime::from_millis(2_500));
    assert_eq!(b - a, -SimTime::from_millis(2_500));
    assert_eq!(b.times(4), SimTime::from_secs(2));
    assert_eq!(a * 0.5, SimTime::from_millis(1_500));
    assert_eq!(a / 2.0, SimTime::from_millis(1_500));
    assert_eq!(a / b, 6.0);
}

#[test]
fn test_sign_predicates_and_clamp() {
    let negative = SimTime::from_secs(1) - SimTime::from_secs(2);
    assert!(negative.is_negative());
    assert_eq!(negative.clamp_non_negative(), SimTime::ZERO);
    assert!(SimTime::ZERO.is_zero());
    assert!(!SimTime::ZERO.is_positive());
    assert_eq!(SimTime::MAX.saturating_add(SimTime::from_secs(1)), SimTime::MAX);
}

#[test]
fn test_ordering() {
    let mut times = vec![
        SimTime::from_secs(5),
        SimTime::ZERO,
        SimTime::from_millis(10),
        SimTime::from_secs(-1),
    ];
    times.sort();
    assert_eq!(
        times,
        vec![
            SimTime::from_secs(-1),
            SimTime::ZERO,
            SimTime::from_millis(10),
            SimTime::from_secs(5),
        ]
    );
}

#[test]
fn test_display_uses_millisecond_precision() {
    assert_eq!(SimTime::from_millis(1_250).to_string(), "1.250s");
    assert_eq!(SimTime::ZERO.to_string(), "0.000s");
}

#[test]
fn test_serde_as_fractional_seconds() {
    let t: SimTime = serde_json::from_str("2.5").unwrap();
    assert_eq!(t, SimTime::from_millis(2_500));
    assert_eq!(serde_json::to_string(&SimTime::from_millis(250)).unwrap(), "0.25");
}
