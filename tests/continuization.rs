//! End-to-end continuization tests.
//!
//! Tests drive the passes through a [`Pipeline`], the way the `hybrid` binary does.

use hybrid_rs::automaton::{AutomatonMode, AutomatonTransition};
use hybrid_rs::config::Configuration;
use hybrid_rs::context::Context;
use hybrid_rs::error::ErrorKind;
use hybrid_rs::estimator::UnavailableEstimator;
use hybrid_rs::expr::Expr;
use hybrid_rs::generate::debug_configuration;
use hybrid_rs::interval::Interval;
use hybrid_rs::parser::{parse_expression, parse_initial, parse_invariant};
use hybrid_rs::passes::{Pipeline, Registry};

fn run(config: &mut Configuration, flag: &str, params: &str, ctx: &Context) -> hybrid_rs::error::Result<()> {
    let registry = Registry::new();
    let mut pipeline = Pipeline::new();
    pipeline.push(&registry, flag, params)?;
    pipeline.run(config, ctx)
}

fn error_modes(config: &Configuration) -> usize {
    config
        .root_base()
        .unwrap()
        .modes
        .keys()
        .filter(|name| name.ends_with("_error_lower") || name.ends_with("_error_upper"))
        .count()
}

fn double_integrator() -> Configuration {
    debug_configuration(&[["x", "v", "0.05"], ["v", "a", "0"], ["a", "-10 * v - 3 * a", "9.5"]]).unwrap()
}

fn flow_interval(config: &Configuration, mode: &str, var: &str) -> Interval {
    let base = config.root_base().unwrap();
    let flow = base.mode(mode).unwrap().flow_of(var).unwrap();
    flow.interval.unwrap_or_else(|| panic!("flow of {} in {} is exact", var, mode))
}

// ─── Event-Triggered ───────────────────────────────────────────────────────────

#[test]
fn cosine_two_windows() {
    let mut config = debug_configuration(&[["y", "cos(t)", "0"], ["t", "1", "0"]]).unwrap();
    let params = "--var y --period 0.1 --times 1.57 3.14 --bloats 0.2 0.2";
    run(&mut config, "continuize", params, &Context::default()).unwrap();

    let base = config.root_base().unwrap();
    assert_eq!(base.modes.len(), 6);
    assert_eq!(error_modes(&config), 4);
    assert_eq!(base.variables.len(), 2);
    assert!(base.mode("on").unwrap().invariant.to_string().starts_with("t <= 1.67"));
    assert_eq!(base.mode("on_2").unwrap().invariant.to_string(), "t >= 1.57 && t <= 3.24");
    assert!(base.transitions.iter().all(|t| !t.is_self_loop()));

    // The error guards compare y' = cos(t) with its bloated range
    let upper = base.transitions_from("on").find(|t| t.to == "on_error_upper").unwrap();
    assert!(upper.guard.to_string().starts_with("cos(t) > "), "{}", upper.guard);
}

#[test]
fn double_integrator_ranges() {
    let mut config = double_integrator();
    let params = "--var a --timevar t --period 0.005 --times 1.5 5 --bloats 4 4";
    run(&mut config, "continuize", params, &Context::default()).unwrap();

    assert_eq!(config.root_base().unwrap().modes.len(), 6);
    let v = flow_interval(&config, "on", "v");
    assert!(v.approx_eq(&Interval::new(-0.046, 0.163), 1e-3), "{}", v);
    let a = flow_interval(&config, "on_2", "a");
    assert!(a.approx_eq(&Interval::new(-0.075, 0.109), 1e-3), "{}", a);
    assert_eq!(config.init["on"].to_string(), "x == 0.05 && v == 0 && a == 9.5 && t == 0");
}

#[test]
fn urgent_initial_mode() {
    let mut config = debug_configuration(&[["x", "v", "0"], ["v", "a", "0"], ["a", "-10 * v - 3 * a", "0"]]).unwrap();
    {
        let base = config.root_base_mut().unwrap();
        base.add_mode(AutomatonMode::new_urgent("init"));
        base.add_transition(
            AutomatonTransition::new("init", "on").with_reset("a", parse_expression("10 * (1 - x) + 3 * (-v)").unwrap()),
        );
    }
    config.init.clear();
    config
        .init
        .insert("init".into(), parse_initial("0 <= x <= 0.1 && v == 0 && a == 0").unwrap());

    let params = "--var a --timevar t --period 0.005 --times 1.5 5 --bloats 4 4";
    run(&mut config, "continuize", params, &Context::default()).unwrap();

    // The reset of the entry transition gives the same start state as the direct model
    let v = flow_interval(&config, "on", "v");
    assert!(v.approx_eq(&Interval::new(-0.046, 0.163), 1e-3), "{}", v);
    let a = flow_interval(&config, "on_2", "a");
    assert!(a.approx_eq(&Interval::new(-0.075, 0.109), 1e-3), "{}", a);

    let base = config.root_base().unwrap();
    let entries: Vec<&str> = base.transitions_from("init").map(|t| t.to.as_str()).collect();
    assert_eq!(entries, vec!["on", "on_2"]);
    assert!(base.mode("init").unwrap().urgent);
}

#[test]
fn bloating_follows_flow_coefficient() {
    let mut config = double_integrator();
    run(
        &mut config,
        "continuize",
        "--var a --period 0.005 --times 1.5 5 --bloats 4 4",
        &Context::default(),
    )
    .unwrap();

    // v' = a has coefficient 1, a' = -10 * v - 3 * a has coefficient -3
    let v = flow_interval(&config, "on_2", "v");
    let a = flow_interval(&config, "on_2", "a");
    assert!(a.approx_eq(&(v * -3.0), 1e-12), "{} vs {}", a, v);
    assert!(v.contains(0.0));
    let x = config.root_base().unwrap().mode("on").unwrap().flow_of("x").unwrap();
    assert!(x.is_exact());
}

#[test]
fn unavailable_backend_keeps_model() {
    let mut config = double_integrator();
    let before = config.clone();
    let ctx = Context::default().with_estimator(UnavailableEstimator::new("offline"));
    let err = run(&mut config, "continuize", "--var a --period 0.005 --times 1.5 --bloats 4", &ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
    assert_eq!(config, before);
}

#[test]
fn parameter_diagnostics() {
    let cases = [
        ("--period 0.005 --times 1.5 --bloats 4", "--var"),
        ("--var a --period 0.005 --times 1.5 5 --bloats 4", "bloat"),
        ("--var a --period -1 --times 1.5 --bloats 4", "period"),
        ("--var a --period 0.005 --times 5 1.5 --bloats 4 4", "increasing"),
        ("--var q --period 0.005 --times 1.5 --bloats 4", "'q'"),
    ];
    for (params, needle) in cases {
        let mut config = double_integrator();
        let err = run(&mut config, "continuize", params, &Context::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Params, "{}", params);
        assert!(err.to_string().contains(needle), "'{}' should mention '{}': {}", params, needle, err);
    }
}

// ─── Time-Triggered ────────────────────────────────────────────────────────────

fn sampled() -> Configuration {
    let mut config = debug_configuration(&[
        ["x", "v", "0.05"],
        ["v", "a", "0"],
        ["a", "0", "9.5"],
        ["t", "1", "0"],
        ["clock", "1", "0"],
    ])
    .unwrap();
    config.settings.time_horizon = 5.0;
    let base = config.root_base_mut().unwrap();
    base.mode_mut("on").unwrap().invariant = parse_invariant("t <= 5 && clock <= 0.005").unwrap();
    base.add_transition(
        AutomatonTransition::new("on", "on")
            .with_guard(Expr::var("clock").ge(Expr::num(0.005)))
            .with_reset("clock", Expr::num(0.0))
            .with_reset("a", parse_expression("10 - 10 * x - 3 * v").unwrap()),
    );
    config
}

/// `[-P, 0] * (range + [-bloat, bloat])` for the double integrator sampled every 5 ms.
fn sampling_error(range: Interval, bloat: f64) -> Interval {
    Interval::new(-0.005, 0.0) * range.bloat(bloat)
}

#[test]
fn time_triggered_two_windows() {
    let mut config = sampled();
    run(&mut config, "continuize_tt", "--step 2.5 --bloat 4", &Context::default()).unwrap();

    let base = config.root_base().unwrap();
    assert_eq!(base.modes.len(), 6);
    assert_eq!(error_modes(&config), 4);
    assert!(!base.variables.contains("clock"));

    let step = base.transitions_from("on").find(|t| t.to == "on_2").unwrap();
    assert!(step.guard.to_string().contains("t >= 2.5"), "{}", step.guard);
    for mode in ["on", "on_2"] {
        let v = base.mode(mode).unwrap().flow_of("v").unwrap();
        assert_eq!(v.expr.to_string(), "10 - 10 * x - 3 * v");
    }

    // Ranges of the sampled law `a` over [0, 2.5] and [2.5, 5]
    let first = flow_interval(&config, "on", "v");
    let expected = sampling_error(Interval::new(-2.989, 9.472), 4.0);
    assert!(first.approx_eq(&expected, 1e-3), "{} vs {}", first, expected);
    let second = flow_interval(&config, "on_2", "v");
    let expected = sampling_error(Interval::new(-0.102, 0.099), 4.0);
    assert!(second.approx_eq(&expected, 1e-3), "{} vs {}", second, expected);
}

#[test]
fn time_triggered_single_window() {
    let mut config = sampled();
    run(&mut config, "continuize_tt", "--step 5 --bloat 4", &Context::default()).unwrap();
    assert_eq!(config.root_base().unwrap().modes.len(), 3);
    assert_eq!(error_modes(&config), 2);

    let v = flow_interval(&config, "on", "v");
    let expected = sampling_error(Interval::new(-2.989, 9.472), 4.0);
    assert!(v.approx_eq(&expected, 1e-3), "{} vs {}", v, expected);
}

#[test]
fn time_triggered_unbounded_horizon() {
    let mut config = sampled();
    config.settings.time_horizon = f64::INFINITY;
    let before = config.clone();
    let ctx = Context::default().with_validation(false);
    let err = run(&mut config, "continuize_tt", "--step 2.5 --bloat 4", &ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(config, before);
}

#[test]
fn time_triggered_step_not_multiple_of_period() {
    let mut config = sampled();
    let before = config.clone();
    let err = run(&mut config, "continuize_tt", "--step 0.0123 --bloat 0.5", &Context::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Params);
    assert_eq!(config, before);
}
