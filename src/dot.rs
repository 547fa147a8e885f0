//! Hybrid automaton to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **Modes** are rounded boxes labelled with the mode name, its invariant and its flow
//! - **Urgent modes** are dashed
//! - **Error modes** (synthesized by continuization) are filled with the error color
//! - **Initial modes** get an incoming arrow from an invisible start point
//! - **Transitions** are directed edges labelled with the guard and the resets
//!
//! # Examples
//!
//! ```
//! use hybrid_rs::generate::debug_configuration;
//!
//! let config = debug_configuration(&[["x", "-x", "1"]]).unwrap();
//! let dot = config.to_dot().unwrap();
//! assert!(dot.starts_with("digraph {"));
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::{self, Write};

use crate::automaton::BaseComponent;
use crate::config::Configuration;
use crate::error::Result;
use crate::printer::PrinterConfig;

/// Configuration options for DOT output generation.
///
/// ```
/// use hybrid_rs::dot::DotConfig;
/// use hybrid_rs::generate::debug_configuration;
///
/// let config = debug_configuration(&[["x", "-x", "1"]]).unwrap();
/// let dot_config = DotConfig {
///     show_flows: false,
///     ..DotConfig::default()
/// };
/// let dot = config.to_dot_with_config(&dot_config).unwrap();
/// assert!(!dot.contains("x' = -x"));
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for modes (default: "box")
    pub mode_shape: &'static str,
    /// Fill color for error modes (default: "lightcoral")
    pub error_color: &'static str,
    /// Whether to print the flow of each mode (default: true)
    pub show_flows: bool,
    /// Whether to print invariants (default: true)
    pub show_invariants: bool,
    /// Operator spellings used in labels
    pub printer: PrinterConfig,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            mode_shape: "box",
            error_color: "lightcoral",
            show_flows: true,
            show_invariants: true,
            printer: PrinterConfig::default(),
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn is_error_mode(name: &str) -> bool {
    name.ends_with("_error_lower") || name.ends_with("_error_upper")
}

impl Configuration {
    /// Converts the flat root automaton to DOT format with default settings.
    pub fn to_dot(&self) -> Result<String> {
        self.to_dot_with_config(&DotConfig::default())
    }

    /// Converts the flat root automaton to DOT format.
    ///
    /// Fails if the root is a network; flatten it first.
    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String> {
        let base = self.root_base()?;
        let mut dot = String::new();
        // Writing into a String cannot fail.
        let _ = write_dot(&mut dot, self, base, config);
        Ok(dot)
    }
}

fn write_dot(dot: &mut impl Write, model: &Configuration, base: &BaseComponent, config: &DotConfig) -> fmt::Result {
    writeln!(dot, "digraph {{")?;
    writeln!(dot, "node [shape={}, style=rounded];", config.mode_shape)?;

    for (i, (name, mode)) in base.modes.iter().enumerate() {
        let mut label = escape(name);
        if config.show_invariants && !mode.invariant.is_true() {
            label.push_str("\\n");
            label.push_str(&escape(&mode.invariant.to_string_with(&config.printer)));
        }
        if config.show_flows {
            for (var, rhs) in mode.flow.iter().flatten() {
                write!(label, "\\n{}' = {}", var, escape(&rhs.to_string_with(&config.printer)))?;
            }
        }
        let mut style = vec!["rounded"];
        if mode.urgent {
            style.push("dashed");
        }
        if is_error_mode(name) {
            style.push("filled");
            writeln!(
                dot,
                "m{} [label=\"{}\", style=\"{}\", fillcolor={}];",
                i,
                label,
                style.join(","),
                config.error_color
            )?;
        } else {
            writeln!(dot, "m{} [label=\"{}\", style=\"{}\"];", i, label, style.join(","))?;
        }
    }

    // Initial modes
    for (i, name) in base.modes.keys().enumerate() {
        if let Some(region) = model.init.get(name) {
            writeln!(dot, "s{} [shape=point];", i)?;
            let region = escape(&region.to_string_with(&config.printer));
            writeln!(dot, "s{} -> m{} [label=\"{}\"];", i, i, region)?;
        }
    }

    for t in &base.transitions {
        let (Some(from), Some(to)) = (base.modes.get_index_of(&t.from), base.modes.get_index_of(&t.to)) else {
            continue;
        };
        let mut label = String::new();
        if !t.guard.is_true() {
            label.push_str(&escape(&t.guard.to_string_with(&config.printer)));
        }
        for (var, value) in &t.reset {
            write!(label, "\\n{} := {}", var, escape(&value.to_string_with(&config.printer)))?;
        }
        writeln!(dot, "m{} -> m{} [label=\"{}\"];", from, to, label)?;
    }

    writeln!(dot, "}}")
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::automaton::{AutomatonMode, AutomatonTransition};
    use crate::expr::Expr;
    use crate::generate::debug_configuration;

    #[test]
    fn test_to_dot_basic() {
        let config = debug_configuration(&[["x", "-x", "1"]]).unwrap();
        let dot = config.to_dot().unwrap();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("x' = -x"));
        assert!(dot.contains("s0 -> m0 [label=\"x == 1\"]"));
    }

    #[test]
    fn test_error_modes_highlighted() {
        let mut config = debug_configuration(&[["x", "1", "0"]]).unwrap();
        let base = config.root_base_mut().unwrap();
        base.add_mode(AutomatonMode::new_urgent("on_error_upper"));
        base.add_transition(AutomatonTransition::new("on", "on_error_upper").with_guard(Expr::var("x").gt(Expr::num(2.0))));
        let dot = config.to_dot().unwrap();
        assert!(dot.contains("style=\"rounded,dashed,filled\", fillcolor=lightcoral"), "{}", dot);
        assert!(dot.contains("m0 -> m1 [label=\"x > 2\"]"), "{}", dot);
    }
}
