//! Composition of a network of automata into a single flat automaton.
//!
//! The flat automaton is the synchronous product of the children without synchronization
//! labels: its modes are tuples of child modes and every child transition fires alone
//! (interleaving), leaving the other children where they are.
//!
//! Naming:
//! - a child variable mapped to a parent variable takes the parent's name, any other child
//!   variable or constant is qualified by the instance name (`tank.level`),
//! - product modes join child mode names with `.` (`fill.drain`); a network with a single child
//!   keeps the child's mode names.
//!
//! Initial regions of the children are conjoined: a product mode is initial only if each of its
//! child modes is. Forbidden regions are disjoined.

use clap::Parser;
use indexmap::IndexMap;
use log::{debug, info};

use crate::automaton::{AutomatonMode, AutomatonTransition, BaseComponent};
use crate::component::{Component, ComponentInstance, ComponentPath};
use crate::config::Configuration;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::expr::Expr;

use super::{parse_params, render_help, Pass};

const FLAG: &str = "flatten";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true)]
struct Params {}

pub struct FlattenAutomatonPass;

impl Pass for FlattenAutomatonPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Flatten Automaton"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, _ctx: &Context) -> Result<()> {
        parse_params::<Params>(FLAG, params)?;
        flatten(config)
    }
}

/// A flattened subtree.
struct Flat {
    base: BaseComponent,
    /// Name qualified relative to the subtree root -> name in `base`.
    aliases: IndexMap<String, String>,
    /// Product mode -> the leaf modes it is made of.
    leaves: IndexMap<String, Vec<(ComponentPath, String)>>,
}

/// Replaces a network root by its flat composition. A flat root is left alone.
pub fn flatten(config: &mut Configuration) -> Result<()> {
    if config.root.is_flat() {
        debug!("Configuration is already flat");
        return Ok(());
    }
    let flat = flatten_component(&config.root)?;
    info!(
        "Flattened network into {} mode(s) and {} transition(s)",
        flat.base.modes.len(),
        flat.base.transitions.len()
    );

    let rename = |e: &Expr| e.rename(&|name: &str| flat.aliases.get(name).cloned().unwrap_or_else(|| name.to_string()));
    let region_of = |regions: &IndexMap<String, Expr>, path: &ComponentPath, mode: &str| {
        regions.get(&path.qualify(mode)).or_else(|| regions.get(mode)).map(rename)
    };

    let mut init = IndexMap::new();
    let mut forbidden = IndexMap::new();
    for (product, leaves) in &flat.leaves {
        let parts: Option<Vec<Expr>> = leaves
            .iter()
            .map(|(path, mode)| region_of(&config.init, path, mode))
            .collect();
        if let Some(parts) = parts {
            init.insert(product.clone(), Expr::and_all(parts));
        }
        let bad: Vec<Expr> = leaves
            .iter()
            .filter_map(|(path, mode)| region_of(&config.forbidden, path, mode))
            .collect();
        if !bad.is_empty() {
            forbidden.insert(product.clone(), Expr::or_all(bad));
        }
    }
    let plot = config.settings.plot_variables.clone().map(|v| flat.aliases.get(&v).cloned().unwrap_or(v));

    config.root = Component::Base(flat.base);
    config.init = init;
    config.forbidden = forbidden;
    config.settings.plot_variables = plot;
    Ok(())
}

fn flatten_component(component: &Component) -> Result<Flat> {
    let net = match component {
        Component::Base(base) => {
            let names = base.variables.iter().chain(base.constants.keys());
            return Ok(Flat {
                aliases: names.map(|n| (n.clone(), n.clone())).collect(),
                leaves: base
                    .modes
                    .keys()
                    .map(|m| (m.clone(), vec![(base.path.clone(), m.clone())]))
                    .collect(),
                base: base.clone(),
            });
        }
        Component::Network(net) => net,
    };

    let mut out = BaseComponent {
        variables: net.variables.clone(),
        constants: net.constants.clone(),
        path: net.path.clone(),
        ..BaseComponent::default()
    };
    let mut aliases: IndexMap<String, String> = net
        .variables
        .iter()
        .chain(net.constants.keys())
        .map(|n| (n.clone(), n.clone()))
        .collect();

    let mut children = Vec::new();
    for (name, instance) in &net.children {
        let mut flat = flatten_component(&instance.child)?;
        let renamed = |v: &str| child_name(name, instance, v);
        flat.base.map_expressions(&mut |e| e.rename(&renamed));
        for mode in flat.base.modes.values_mut() {
            if let Some(flow) = &mut mode.flow {
                *flow = std::mem::take(flow).into_iter().map(|(v, rhs)| (renamed(&v), rhs)).collect();
            }
        }
        for t in &mut flat.base.transitions {
            t.reset = std::mem::take(&mut t.reset).into_iter().map(|(v, rhs)| (renamed(&v), rhs)).collect();
        }
        for v in &flat.base.variables {
            if instance.parent_var_for(v).is_none() {
                out.variables.insert(renamed(v));
            }
        }
        for (c, value) in &flat.base.constants {
            if instance.parent_var_for(c).is_none() {
                out.constants.insert(renamed(c), *value);
            }
        }
        for (qualified, local) in &flat.aliases {
            aliases.insert(format!("{}.{}", name, qualified), renamed(local));
        }
        children.push(flat);
    }

    let mut product = IndexMap::new();
    let mut leaves = IndexMap::new();
    for tuple in mode_tuples(&children) {
        let mode = product_mode(&children, &tuple)?;
        leaves.insert(
            mode.name.clone(),
            children
                .iter()
                .zip(&tuple)
                .flat_map(|(c, &i)| c.leaves[i].clone())
                .collect::<Vec<_>>(),
        );
        product.insert(tuple, mode.name.clone());
        out.modes.insert(mode.name.clone(), mode);
    }

    for (tuple, from) in &product {
        for (c, child) in children.iter().enumerate() {
            let (current, _) = child
                .base
                .modes
                .get_index(tuple[c])
                .ok_or_else(|| Error::unsupported(format!("component '{}'", net.path), "inconsistent mode index"))?;
            for t in child.base.transitions_from(current) {
                let mut target = tuple.clone();
                target[c] = child.base.modes.get_index_of(&t.to).ok_or_else(|| {
                    Error::validation(t.describe(), format!("target mode '{}' does not exist", t.to))
                })?;
                out.transitions.push(AutomatonTransition {
                    from: from.clone(),
                    to: product[&target].clone(),
                    ..t.clone()
                });
            }
        }
    }

    Ok(Flat {
        base: out,
        aliases,
        leaves,
    })
}

/// Name of child-local `var` of `instance` in the parent.
fn child_name(instance_name: &str, instance: &ComponentInstance, var: &str) -> String {
    match instance.parent_var_for(var) {
        Some(parent) => parent.to_string(),
        None => format!("{}.{}", instance_name, var),
    }
}

/// Every combination of child mode indices, in lexicographic order.
fn mode_tuples(children: &[Flat]) -> Vec<Vec<usize>> {
    let mut tuples = vec![Vec::new()];
    for child in children {
        tuples = tuples
            .into_iter()
            .flat_map(|prefix| {
                (0..child.base.modes.len()).map(move |i| {
                    let mut t = prefix.clone();
                    t.push(i);
                    t
                })
            })
            .collect();
    }
    tuples
}

fn product_mode(children: &[Flat], tuple: &[usize]) -> Result<AutomatonMode> {
    let parts: Vec<&AutomatonMode> = children
        .iter()
        .zip(tuple)
        .filter_map(|(c, &i)| c.base.modes.get_index(i).map(|(_, m)| m))
        .collect();
    let name = parts.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(".");

    let mut mode = AutomatonMode::new(name);
    mode.urgent = parts.iter().any(|m| m.urgent);
    mode.invariant = Expr::and_all(parts.iter().map(|m| m.invariant.clone()));
    if parts.iter().any(|m| !m.has_flow()) {
        mode.flow = None;
        return Ok(mode);
    }
    for part in &parts {
        for (var, rhs) in part.flow.iter().flatten() {
            if mode.flow_of(var).is_some() {
                return Err(Error::unsupported(
                    format!("mode '{}'", mode.name),
                    format!("flow of '{}' is defined by more than one component", var),
                ));
            }
            mode.set_flow(var.clone(), rhs.clone());
        }
    }
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::component::NetworkComponent;
    use crate::error::ErrorKind;
    use crate::parser::{parse_expression, parse_initial};

    fn tank(level: &str) -> BaseComponent {
        let mut ha = BaseComponent::with_variables([level, "inflow"]);
        ha.add_mode(AutomatonMode::new("fill")).set_flow(level, Expr::var("inflow"));
        ha.add_mode(AutomatonMode::new("drain")).set_flow(level, Expr::num(-1.0));
        ha.add_transition(
            AutomatonTransition::new("fill", "drain").with_guard(parse_expression("h >= 10").unwrap()),
        );
        ha
    }

    fn two_tanks() -> Configuration {
        let mut net = NetworkComponent::with_variables(["h1", "h2"]);
        net.add_child("left", ComponentInstance::new(tank("h")).with_mapping("h1", "h"));
        net.add_child("right", ComponentInstance::new(tank("h")).with_mapping("h2", "h"));
        let mut config = Configuration::new(net);
        config.init.insert("left.fill".into(), parse_initial("h1 == 0 && left.inflow == 1").unwrap());
        config.init.insert("right.drain".into(), parse_initial("h2 == 5").unwrap());
        config.forbidden.insert("right.fill".into(), parse_initial("h2 >= 20").unwrap());
        config
    }

    #[test]
    fn test_product() {
        let mut config = two_tanks();
        assert!(config.validate().is_ok());
        FlattenAutomatonPass.run(&mut config, "", &Context::default()).unwrap();
        assert!(config.validate().is_ok());

        let base = config.root_base().unwrap();
        let vars: Vec<&str> = base.variables.iter().map(String::as_str).collect();
        assert_eq!(vars, vec!["h1", "h2", "left.inflow", "right.inflow"]);
        let modes: Vec<&str> = base.modes.keys().map(String::as_str).collect();
        assert_eq!(modes, vec!["fill.fill", "fill.drain", "drain.fill", "drain.drain"]);
        // Each of the two child transitions is enabled in two product modes.
        assert_eq!(base.transitions.len(), 4);

        let ff = base.mode("fill.fill").unwrap();
        assert_eq!(ff.flow_of("h1").unwrap().to_string(), "left.inflow");
        assert_eq!(ff.flow_of("h2").unwrap().to_string(), "right.inflow");
        let guards: Vec<String> = base.transitions_from("fill.fill").map(|t| t.guard.to_string()).collect();
        assert_eq!(guards, vec!["h1 >= 10", "h2 >= 10"]);

        assert_eq!(config.init.len(), 1);
        assert_eq!(config.init["fill.drain"].to_string(), "h1 == 0 && left.inflow == 1 && h2 == 5");
        assert_eq!(config.forbidden.keys().collect::<Vec<_>>(), vec!["fill.fill", "drain.fill"]);
    }

    #[test]
    fn test_single_child_keeps_names() {
        let mut net = NetworkComponent::with_variables(["x"]);
        net.add_child("only", ComponentInstance::new(tank("h")).with_mapping("x", "h"));
        let mut config = Configuration::new(net);
        config.init.insert("fill".into(), parse_initial("x == 0").unwrap());
        flatten(&mut config).unwrap();
        let base = config.root_base().unwrap();
        assert_eq!(base.modes.keys().collect::<Vec<_>>(), vec!["fill", "drain"]);
        assert_eq!(config.init["fill"].to_string(), "x == 0");
        assert!(base.variables.contains("only.inflow"));
    }

    #[test]
    fn test_conflicting_flows() {
        let mut net = NetworkComponent::with_variables(["h"]);
        net.add_child("a", ComponentInstance::new(tank("h")).with_mapping("h", "h"));
        net.add_child("b", ComponentInstance::new(tank("h")).with_mapping("h", "h"));
        let err = flatten(&mut Configuration::new(net)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(err.to_string().contains("'h'"), "{}", err);
    }

    #[test]
    fn test_flat_root_untouched() {
        let mut config = Configuration::new(tank("h"));
        let before = config.clone();
        flatten(&mut config).unwrap();
        assert_eq!(config, before);
    }
}
