//! The root aggregate: component tree, initial and forbidden regions, settings.
//!
//! A [`Configuration`] is built once (by an importer or one of the [generators][crate::generate]),
//! mutated in place by a sequence of [passes][crate::passes], and finally handed read-only to an
//! emitter. [`Configuration::validate`] is the single integrity gate between passes.

use std::fmt::{self, Write};

use indexmap::IndexMap;

use crate::automaton::BaseComponent;
use crate::component::Component;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::printer::PrinterConfig;

/// Analysis settings carried along with the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub time_horizon: f64,
    /// Step hint for downstream reachability tools.
    pub step: f64,
    pub max_jumps: usize,
    /// Variables for the two plot axes; empty strings when unset.
    pub plot_variables: [String; 2],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_horizon: 10.0,
            step: 0.01,
            max_jumps: 1000,
            plot_variables: [String::new(), String::new()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub root: Component,
    /// Allowed initial region per mode name.
    pub init: IndexMap<String, Expr>,
    /// Forbidden region per mode name.
    pub forbidden: IndexMap<String, Expr>,
    pub settings: Settings,
}

impl Configuration {
    pub fn new(root: impl Into<Component>) -> Self {
        Self {
            root: root.into(),
            init: IndexMap::new(),
            forbidden: IndexMap::new(),
            settings: Settings::default(),
        }
    }

    /// The root as a flat automaton.
    pub fn root_base(&self) -> Result<&BaseComponent> {
        self.root.as_base().ok_or_else(not_flat)
    }

    pub fn root_base_mut(&mut self) -> Result<&mut BaseComponent> {
        self.root.as_base_mut().ok_or_else(not_flat)
    }

    pub fn component(&self, path: &crate::component::ComponentPath) -> Option<&Component> {
        self.root.find(path)
    }

    /// Every mode name an `init`/`forbidden` key may refer to.
    ///
    /// For a flat root these are the plain mode names. Inside networks both the plain name and the
    /// name qualified by the instance path are accepted.
    pub fn mode_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        for base in self.root.base_components() {
            for name in base.modes.keys() {
                out.push(name.clone());
                if !base.path.is_root() {
                    out.push(base.path.qualify(name));
                }
            }
        }
        out
    }

    /// Checks every configuration invariant.
    pub fn validate(&self) -> Result<()> {
        self.root.validate()?;

        let modes = self.mode_names();
        let names = self.root.qualified_names();
        for (label, regions) in [("initial", &self.init), ("forbidden", &self.forbidden)] {
            for (mode, region) in regions {
                let entity = format!("{} region of mode '{}'", label, mode);
                if !modes.iter().any(|m| m == mode) {
                    return Err(Error::validation(entity, "no such mode"));
                }
                if let Some(v) = region.variables().into_iter().find(|v| !names.contains(v)) {
                    return Err(Error::validation(
                        entity,
                        format!("'{}' references undeclared variable '{}'", region, v),
                    ));
                }
            }
        }

        for var in &self.settings.plot_variables {
            if !var.is_empty() && !names.contains(var) {
                return Err(Error::validation(
                    "settings",
                    format!("plot variable '{}' is not declared", var),
                ));
            }
        }
        if !(self.settings.time_horizon.is_finite() && self.settings.time_horizon > 0.0) {
            return Err(Error::validation(
                "settings",
                format!("time horizon must be positive, got {}", self.settings.time_horizon),
            ));
        }

        Ok(())
    }

    /// Human-readable dump using the given operator spellings.
    pub fn to_string_with(&self, printer: &PrinterConfig) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write(&mut out, printer);
        out
    }

    fn write(&self, out: &mut impl Write, printer: &PrinterConfig) -> fmt::Result {
        write_component(out, &self.root, printer, 0)?;
        for (mode, region) in &self.init {
            writeln!(out, "init {}: {}", mode, region.to_string_with(printer))?;
        }
        for (mode, region) in &self.forbidden {
            writeln!(out, "forbidden {}: {}", mode, region.to_string_with(printer))?;
        }
        let s = &self.settings;
        write!(
            out,
            "settings: time horizon {}, step {}, max jumps {}",
            s.time_horizon, s.step, s.max_jumps
        )?;
        if !s.plot_variables[0].is_empty() {
            write!(out, ", plot {} {}", s.plot_variables[0], s.plot_variables[1])?;
        }
        writeln!(out)
    }
}

fn not_flat() -> Error {
    Error::unsupported(
        "configuration root",
        "expected a flat automaton, run the 'flatten' pass first",
    )
}

fn write_component(out: &mut impl Write, component: &Component, printer: &PrinterConfig, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    let vars: Vec<&str> = component.variables().iter().map(String::as_str).collect();
    writeln!(out, "{}variables: {}", pad, vars.join(", "))?;
    for (name, value) in component.constants() {
        writeln!(out, "{}constant {} = {}", pad, name, value)?;
    }
    match component {
        Component::Base(base) => {
            for mode in base.modes.values() {
                write!(out, "{}mode {}", pad, mode.name)?;
                if mode.urgent {
                    write!(out, " (urgent)")?;
                }
                writeln!(out)?;
                writeln!(out, "{}  invariant: {}", pad, mode.invariant.to_string_with(printer))?;
                match &mode.flow {
                    Some(flow) => {
                        for (var, rhs) in flow {
                            writeln!(out, "{}  {}' = {}", pad, var, rhs.to_string_with(printer))?;
                        }
                    }
                    None => writeln!(out, "{}  no flow", pad)?,
                }
            }
            for t in &base.transitions {
                writeln!(out, "{}transition {} -> {}", pad, t.from, t.to)?;
                writeln!(out, "{}  guard: {}", pad, t.guard.to_string_with(printer))?;
                for (var, value) in &t.reset {
                    writeln!(out, "{}  {} := {}", pad, var, value.to_string_with(printer))?;
                }
            }
        }
        Component::Network(net) => {
            for (name, instance) in &net.children {
                let maps: Vec<String> = instance
                    .mappings
                    .iter()
                    .map(|m| format!("{} = {}", m.child_var, m.parent_var))
                    .collect();
                writeln!(out, "{}instance {} [{}]", pad, name, maps.join(", "))?;
                write_component(out, &instance.child, printer, depth + 1)?;
            }
        }
    }
    Ok(())
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, &PrinterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::automaton::{AutomatonMode, AutomatonTransition};
    use crate::component::{ComponentInstance, NetworkComponent};
    use crate::error::ErrorKind;
    use crate::parser::{parse_expression, parse_initial};

    fn flat() -> Configuration {
        let mut ha = BaseComponent::with_variables(["x", "t"]);
        let on = ha.add_mode(AutomatonMode::new("on"));
        on.set_flow("x", parse_expression("-x").unwrap());
        on.set_flow("t", Expr::num(1.0));
        let mut config = Configuration::new(ha);
        config.init.insert("on".into(), parse_initial("x == 1 && t == 0").unwrap());
        config.settings.plot_variables = ["t".into(), "x".into()];
        config
    }

    #[test]
    fn test_valid() {
        let config = flat();
        assert!(config.validate().is_ok());
        assert!(config.root_base().is_ok());
    }

    #[test]
    fn test_init_must_name_mode() {
        let mut config = flat();
        config.init.insert("off".into(), Expr::TRUE);
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("mode 'off'"), "{}", err);
    }

    #[test]
    fn test_init_must_use_declared_variables() {
        let mut config = flat();
        config.forbidden.insert("on".into(), parse_initial("y >= 2").unwrap());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("undeclared variable 'y'"), "{}", err);
    }

    #[test]
    fn test_plot_variables_checked() {
        let mut config = flat();
        config.settings.plot_variables[1] = "z".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_transition_between_components_rejected() {
        let mut config = flat();
        let base = config.root_base_mut().unwrap();
        base.add_transition(AutomatonTransition::new("on", "off"));
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_network_root() {
        let mut net = NetworkComponent::with_variables(["x"]);
        let mut child = BaseComponent::with_variables(["y"]);
        child.add_mode(AutomatonMode::new("run")).set_flow("y", Expr::num(1.0));
        net.add_child("c", ComponentInstance::new(child).with_mapping("x", "y"));
        let mut config = Configuration::new(net);
        config.init.insert("c.run".into(), parse_initial("x == 0").unwrap());
        assert!(config.validate().is_ok());
        assert_eq!(config.root_base().unwrap_err().kind(), ErrorKind::Unsupported);
        assert!(config.to_string().contains("instance c [y = x]"));
    }

    #[test]
    fn test_display() {
        let text = flat().to_string();
        assert!(text.contains("mode on\n"), "{}", text);
        assert!(text.contains("  x' = -x\n"), "{}", text);
        assert!(text.contains("init on: x == 1 && t == 0"), "{}", text);
    }
}
