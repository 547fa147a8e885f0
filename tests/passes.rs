//! Pass framework tests: validation round-trip, structural errors and the registry.

use std::sync::Arc;

use hybrid_rs::automaton::{AutomatonMode, AutomatonTransition, BaseComponent};
use hybrid_rs::component::{ComponentInstance, NetworkComponent};
use hybrid_rs::config::Configuration;
use hybrid_rs::context::Context;
use hybrid_rs::error::{Error, ErrorKind};
use hybrid_rs::expr::Expr;
use hybrid_rs::generate::debug_configuration;
use hybrid_rs::interval::Interval;
use hybrid_rs::parser::{parse_guard, parse_initial};
use hybrid_rs::passes::{run_pass, Pipeline, Registry, SimplifyExpressionsPass};

/// Two modes, a point constant, a non-point constant and a disjunctive guard.
fn thermostat() -> Configuration {
    let mut config = debug_configuration(&[["x", "-k * x + heat", "20"], ["y", "1", "0"]]).unwrap();
    let base = config.root_base_mut().unwrap();
    base.add_constant("k", Interval::point(0.1));
    base.add_constant("heat", Interval::new(1.0, 2.0));
    base.add_mode(AutomatonMode::new("off"))
        .set_flow("x", Expr::num(-0.1).mul(Expr::var("x")));
    base.mode_mut("off").unwrap().set_flow("y", Expr::num(1.0));
    base.add_transition(AutomatonTransition::new("on", "off").with_guard(parse_guard("x >= 22 || y >= 10").unwrap()));
    base.add_transition(AutomatonTransition::new("off", "on").with_guard(parse_guard("x <= 18").unwrap()).with_reset("y", Expr::num(0.0)));
    config.forbidden.insert("off".into(), parse_initial("x <= 0").unwrap());
    config
}

fn tank(level: &str) -> BaseComponent {
    let mut ha = BaseComponent::with_variables([level, "inflow"]);
    ha.add_mode(AutomatonMode::new("fill")).set_flow(level, Expr::var("inflow"));
    ha.add_mode(AutomatonMode::new("drain")).set_flow(level, Expr::num(-1.0));
    ha.add_transition(AutomatonTransition::new("fill", "drain").with_guard(parse_guard("h >= 10").unwrap()));
    ha
}

fn two_tanks(left: BaseComponent, right: BaseComponent) -> Configuration {
    let mut net = NetworkComponent::with_variables(["h1", "h2"]);
    net.add_child("left", ComponentInstance::new(left).with_mapping("h1", "h"));
    net.add_child("right", ComponentInstance::new(right).with_mapping("h2", "h"));
    let mut config = Configuration::new(net);
    config.init.insert("left.fill".into(), parse_initial("h1 == 0 && left.inflow == 1").unwrap());
    config.init.insert("right.drain".into(), parse_initial("h2 == 5 && right.inflow == 0").unwrap());
    config
}

// ─── Validation Round-Trip ─────────────────────────────────────────────────────

#[test]
fn every_peer_pass_preserves_validity() {
    let registry = Registry::new();
    let ctx = Context::default();
    let cases = [
        ("sub_constants", ""),
        ("simplify", ""),
        ("flatten", ""),
        ("order_reduction", "--keep x"),
        ("identity_resets", ""),
        ("split_disjunctions", ""),
        ("time_scale", "--multiplier 0.5"),
        ("shorten_mode_names", "--max-len 4"),
        ("remove_unsat_invariants", ""),
    ];
    for (flag, params) in cases {
        let mut config = thermostat();
        config.validate().unwrap();
        run_pass(registry.get(flag).unwrap().as_ref(), &mut config, params, &ctx)
            .unwrap_or_else(|e| panic!("{} failed: {}", flag, e));
        config.validate().unwrap_or_else(|e| panic!("{} broke the model: {}", flag, e));
    }
}

#[test]
fn peer_passes_chain() {
    let registry = Registry::new();
    let mut pipeline = Pipeline::new();
    for flag in ["flatten", "sub_constants", "simplify", "identity_resets", "split_disjunctions"] {
        pipeline.push(&registry, flag, "").unwrap();
    }
    let mut config = two_tanks(tank("h"), tank("h"));
    pipeline.run(&mut config, &Context::default()).unwrap();
    assert!(config.validate().is_ok());

    let base = config.root_base().unwrap();
    assert_eq!(base.modes.len(), 4);
    for t in &base.transitions {
        assert_eq!(t.reset.len(), base.variables.len(), "{}", t.describe());
    }

    let mut config = thermostat();
    pipeline.run(&mut config, &Context::default()).unwrap();
    let base = config.root_base().unwrap();
    // One transition per disjunct of the `on -> off` guard
    assert_eq!(base.transitions_from("on").count(), 2);
    let x = base.mode("on").unwrap().flow_of("x").unwrap();
    assert!(!x.expr.mentions("k"), "{}", x);
    assert!(x.expr.mentions("heat"), "{}", x);
}

#[test]
fn time_scale_reaches_every_component() {
    let mut config = two_tanks(tank("h"), tank("h"));
    let registry = Registry::new();
    run_pass(registry.get("time_scale").unwrap().as_ref(), &mut config, "--multiplier 3", &Context::default()).unwrap();

    for base in config.root.base_components() {
        let fill = base.mode("fill").unwrap().flow_of("h").unwrap();
        assert_eq!(fill.expr.to_string(), "3 * inflow");
        let drain = base.mode("drain").unwrap().flow_of("h").unwrap();
        assert_eq!(drain.expr.as_num(), Some(-3.0));
    }
}

// ─── Structural Errors ─────────────────────────────────────────────────────────

#[test]
fn transition_across_components_fails_validation() {
    let mut left = tank("h");
    left.add_transition(AutomatonTransition::new("drain", "pump"));
    let mut right = tank("h");
    right.add_mode(AutomatonMode::new("pump")).set_flow("h", Expr::num(2.0));

    let config = two_tanks(left, right);
    let err = config.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("'pump'"), "{}", err);
    assert!(err.to_string().contains("left"), "{}", err);
}

#[test]
fn region_of_unknown_mode_fails_validation() {
    let mut config = thermostat();
    config.init.insert("standby".into(), Expr::TRUE);
    assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Validation);
}

// ─── Registry ──────────────────────────────────────────────────────────────────

#[test]
fn registry_lookup() {
    let registry = Registry::new();
    assert_eq!(registry.flags().count(), 11);
    assert_eq!(registry.get("continuize").unwrap().name(), "Continuization");
    assert_eq!(registry.get("pretty").err(), Some(Error::UnknownPass("pretty".into())));

    let mut registry = Registry::empty();
    registry.register(Arc::new(SimplifyExpressionsPass)).unwrap();
    assert_eq!(registry.register(Arc::new(SimplifyExpressionsPass)).unwrap_err().kind(), ErrorKind::Params);
}

#[test]
fn help_lists_parameters() {
    let registry = Registry::new();
    let help = registry.get("continuize").unwrap().param_help();
    for option in ["--var", "--period", "--times", "--bloats"] {
        assert!(help.contains(option), "{}", help);
    }
    assert!(registry.get("order_reduction").unwrap().param_help().contains("--keep"));
}
