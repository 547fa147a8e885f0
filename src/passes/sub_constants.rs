//! Inline constants whose value is a single point.

use clap::Parser;
use indexmap::IndexMap;
use log::debug;

use crate::component::Component;
use crate::config::Configuration;
use crate::context::Context;
use crate::error::Result;
use crate::expr::Expr;
use crate::interval::Interval;

use super::{parse_params, render_help, Pass};

const FLAG: &str = "sub_constants";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true)]
struct Params {}

pub struct SubstituteConstantsPass;

impl Pass for SubstituteConstantsPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Substitute Constants"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, _ctx: &Context) -> Result<()> {
        parse_params::<Params>(FLAG, params)?;
        let inherited = IndexMap::new();
        let substituted = substitute(&mut config.root, &inherited);
        let env = |name: &str| substituted.get(name).map(|v| Expr::num(*v));
        for region in config.init.values_mut().chain(config.forbidden.values_mut()) {
            *region = region.substitute_with(&env);
        }
        Ok(())
    }
}

/// Substitutes the point constants of `component` (and those inherited from enclosing networks)
/// into its subtree, returning the constants it removed.
fn substitute(component: &mut Component, inherited: &IndexMap<String, f64>) -> IndexMap<String, f64> {
    let constants = match component {
        Component::Base(base) => &mut base.constants,
        Component::Network(net) => &mut net.constants,
    };
    let (points, rest): (IndexMap<String, Interval>, IndexMap<String, Interval>) =
        constants.drain(..).partition(|(_, value)| value.is_point());
    *constants = rest;

    let mut values = inherited.clone();
    for (name, value) in &points {
        debug!("Substituting constant '{}' = {}", name, value.min);
        values.insert(name.clone(), value.min);
    }

    match component {
        Component::Base(base) => {
            let env = |name: &str| values.get(name).map(|v| Expr::num(*v));
            base.map_expressions(&mut |e| e.substitute_with(&env));
        }
        Component::Network(net) => {
            for instance in net.children.values_mut() {
                // Child names shadow inherited ones.
                let mut visible = values.clone();
                for name in instance.child.variables() {
                    visible.shift_remove(name);
                }
                substitute(&mut instance.child, &visible);
            }
        }
    }
    points.into_iter().map(|(name, value)| (name, value.min)).collect()
}
