//! Cone-of-influence reduction: keep the requested variables and everything they depend on.
//!
//! A variable is in the cone if it is requested, if it appears in a guard or an invariant (it
//! decides which mode the system is in), or if a kept variable's flow or reset reads it. All
//! other variables are removed together with their flows and resets; conjuncts of initial and
//! forbidden regions that mention them are dropped.

use clap::Parser;
use indexmap::IndexSet;
use log::{debug, info};

use crate::automaton::BaseComponent;
use crate::config::Configuration;
use crate::context::Context;
use crate::error::{Error, Result};

use super::{parse_params, render_help, Pass};

const FLAG: &str = "order_reduction";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true)]
struct Params {
    /// Variables to keep.
    #[arg(long, value_name = "VAR", num_args = 1.., required = true)]
    keep: Vec<String>,
}

pub struct OrderReductionPass;

impl Pass for OrderReductionPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Order Reduction"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, _ctx: &Context) -> Result<()> {
        let params = parse_params::<Params>(FLAG, params)?;
        let base = config.root_base_mut()?;
        if let Some(v) = params.keep.iter().find(|v| !base.variables.contains(*v)) {
            return Err(Error::params(FLAG, format!("variable '{}' is not declared", v)));
        }

        let cone = cone_of_influence(base, &params.keep);
        let removed: Vec<String> = base.variables.iter().filter(|v| !cone.contains(*v)).cloned().collect();
        info!("Keeping {} of {} variable(s), removing {:?}", cone.len(), base.variables.len(), removed);

        for mode in base.modes.values_mut() {
            if let Some(flow) = &mut mode.flow {
                flow.retain(|v, _| cone.contains(v));
            }
        }
        for t in &mut base.transitions {
            t.reset.retain(|v, _| cone.contains(v));
        }
        base.variables.retain(|v| cone.contains(v));

        for var in &removed {
            for region in config.init.values_mut().chain(config.forbidden.values_mut()) {
                *region = region.without_conjuncts_mentioning(var);
            }
            for plot in &mut config.settings.plot_variables {
                if plot == var {
                    debug!("Clearing plot variable '{}'", var);
                    plot.clear();
                }
            }
        }
        Ok(())
    }
}

fn cone_of_influence(base: &BaseComponent, keep: &[String]) -> IndexSet<String> {
    let mut cone: IndexSet<String> = keep.iter().cloned().collect();
    for mode in base.modes.values() {
        cone.extend(mode.invariant.variables());
    }
    for t in &base.transitions {
        cone.extend(t.guard.variables());
    }
    cone.retain(|v| base.variables.contains(v));

    let mut i = 0;
    while i < cone.len() {
        let var = cone[i].clone();
        let reads = base
            .modes
            .values()
            .filter_map(|m| m.flow_of(&var))
            .chain(base.transitions.iter().filter_map(|t| t.reset.get(&var)))
            .flat_map(|rhs| rhs.expr.variables());
        for dep in reads {
            if base.variables.contains(&dep) {
                cone.insert(dep);
            }
        }
        i += 1;
    }
    cone
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::error::ErrorKind;
    use crate::generate::debug_configuration;

    #[test]
    fn test_cone() {
        let mut config = debug_configuration(&[
            ["x", "v", "0"],
            ["v", "-x", "1"],
            ["z", "x + w", "2"],
            ["w", "1", "3"],
            ["q", "q", "4"],
        ])
        .unwrap();
        OrderReductionPass.run(&mut config, "--keep v", &Context::default()).unwrap();
        assert!(config.validate().is_ok());

        let base = config.root_base().unwrap();
        let vars: Vec<&str> = base.variables.iter().map(String::as_str).collect();
        assert_eq!(vars, vec!["x", "v"]);
        assert!(base.mode("on").unwrap().flow_of("z").is_none());
        assert_eq!(config.init["on"].to_string(), "x == 0 && v == 1");
    }

    #[test]
    fn test_guards_are_kept() {
        let mut config = debug_configuration(&[["x", "1", "0"], ["y", "2", "0"]]).unwrap();
        config.root_base_mut().unwrap().mode_mut("on").unwrap().invariant =
            crate::parser::parse_invariant("y <= 10").unwrap();
        OrderReductionPass.run(&mut config, "--keep x", &Context::default()).unwrap();
        assert_eq!(config.root_base().unwrap().variables.len(), 2);
    }

    #[test]
    fn test_params() {
        let mut config = debug_configuration(&[["x", "1", "0"]]).unwrap();
        for bad in ["", "--keep", "--keep nope"] {
            let err = OrderReductionPass.run(&mut config, bad, &Context::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Params, "{:?}", bad);
        }
    }
}
