//! Flat hybrid automata: modes, transitions and [`BaseComponent`].
//!
//! A mode owns its flow dynamics (one [`ExpressionInterval`] per variable), an invariant and an
//! urgency flag. Transitions reference modes by name, so a component can be cloned, renamed or
//! restructured without pointer fix-ups; a transition naming a mode that the component does not
//! own is caught by [`BaseComponent::validate`].

use indexmap::{IndexMap, IndexSet};

use crate::component::ComponentPath;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::expr_interval::ExpressionInterval;
use crate::interval::Interval;

/// A discrete location of a hybrid automaton.
///
/// # Invariants
///
/// - `name` is unique within the owning component.
/// - `flow == None` means the mode has no continuous dynamics (time does not elapse in it).
#[derive(Debug, Clone, PartialEq)]
pub struct AutomatonMode {
    pub name: String,
    pub flow: Option<IndexMap<String, ExpressionInterval>>,
    pub invariant: Expr,
    pub urgent: bool,
}

impl AutomatonMode {
    /// A mode with empty flow dynamics and a `true` invariant.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flow: Some(IndexMap::new()),
            invariant: Expr::TRUE,
            urgent: false,
        }
    }

    /// An urgent mode without flow dynamics.
    pub fn new_urgent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flow: None,
            invariant: Expr::TRUE,
            urgent: true,
        }
    }

    pub fn has_flow(&self) -> bool {
        self.flow.is_some()
    }

    pub fn flow_of(&self, var: &str) -> Option<&ExpressionInterval> {
        self.flow.as_ref().and_then(|flow| flow.get(var))
    }

    /// Sets the flow of `var`, creating the flow map if the mode had none.
    pub fn set_flow(&mut self, var: impl Into<String>, rhs: impl Into<ExpressionInterval>) {
        self.flow.get_or_insert_with(IndexMap::new).insert(var.into(), rhs.into());
    }

    /// Whether `var` has flow `1` (exactly, with no uncertainty).
    pub fn is_clock(&self, var: &str) -> bool {
        matches!(
            self.flow_of(var),
            Some(ExpressionInterval { expr: Expr::Num(v), interval: None }) if *v == 1.0
        )
    }

    /// Applies `f` to every expression in the mode (flow right-hand sides and the invariant).
    pub fn map_expressions(&mut self, f: &mut impl FnMut(&Expr) -> Expr) {
        if let Some(flow) = &mut self.flow {
            for rhs in flow.values_mut() {
                rhs.expr = f(&rhs.expr);
            }
        }
        self.invariant = f(&self.invariant);
    }
}

/// A guarded discrete jump between two modes of the same component.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomatonTransition {
    pub from: String,
    pub to: String,
    pub guard: Expr,
    /// Variables absent from the map keep their value.
    pub reset: IndexMap<String, ExpressionInterval>,
}

impl AutomatonTransition {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            guard: Expr::TRUE,
            reset: IndexMap::new(),
        }
    }

    pub fn with_guard(mut self, guard: Expr) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_reset(mut self, var: impl Into<String>, value: impl Into<ExpressionInterval>) -> Self {
        self.reset.insert(var.into(), value.into());
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }

    pub fn map_expressions(&mut self, f: &mut impl FnMut(&Expr) -> Expr) {
        self.guard = f(&self.guard);
        for value in self.reset.values_mut() {
            value.expr = f(&value.expr);
        }
    }

    /// Human-readable identification used in diagnostics.
    pub fn describe(&self) -> String {
        format!("transition '{}' -> '{}'", self.from, self.to)
    }
}

/// A flat automaton.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseComponent {
    pub variables: IndexSet<String>,
    /// Named parameters, possibly uncertain.
    pub constants: IndexMap<String, Interval>,
    pub modes: IndexMap<String, AutomatonMode>,
    pub transitions: Vec<AutomatonTransition>,
    /// Location of this component inside the configuration tree.
    pub path: ComponentPath,
}

// Constructors
impl BaseComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables<S: Into<String>>(variables: impl IntoIterator<Item = S>) -> Self {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

// Modification
impl BaseComponent {
    pub fn add_variable(&mut self, name: impl Into<String>) {
        self.variables.insert(name.into());
    }

    pub fn add_constant(&mut self, name: impl Into<String>, value: Interval) {
        self.constants.insert(name.into(), value);
    }

    /// Inserts `mode`, replacing any mode with the same name, and returns it for further setup.
    pub fn add_mode(&mut self, mode: AutomatonMode) -> &mut AutomatonMode {
        let name = mode.name.clone();
        let (index, _) = self.modes.insert_full(name, mode);
        &mut self.modes[index]
    }

    pub fn add_transition(&mut self, transition: AutomatonTransition) -> &mut AutomatonTransition {
        self.transitions.push(transition);
        let last = self.transitions.len() - 1;
        &mut self.transitions[last]
    }

    /// Applies `f` to every expression of the component.
    pub fn map_expressions(&mut self, f: &mut impl FnMut(&Expr) -> Expr) {
        for mode in self.modes.values_mut() {
            mode.map_expressions(f);
        }
        for transition in &mut self.transitions {
            transition.map_expressions(f);
        }
    }

    /// Removes `var` from the variable set if nothing references it any more.
    ///
    /// Returns whether the variable was removed.
    pub fn remove_variable_if_unused(&mut self, var: &str) -> bool {
        if self.referenced_variables().contains(var) {
            return false;
        }
        self.variables.shift_remove(var)
    }
}

// Queries
impl BaseComponent {
    pub fn mode(&self, name: &str) -> Option<&AutomatonMode> {
        self.modes.get(name)
    }

    pub fn mode_mut(&mut self, name: &str) -> Option<&mut AutomatonMode> {
        self.modes.get_mut(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.variables.contains(name) || self.constants.contains_key(name)
    }

    pub fn transitions_from<'a>(&'a self, mode: &'a str) -> impl Iterator<Item = &'a AutomatonTransition> + 'a {
        self.transitions.iter().filter(move |t| t.from == mode)
    }

    pub fn transitions_to<'a>(&'a self, mode: &'a str) -> impl Iterator<Item = &'a AutomatonTransition> + 'a {
        self.transitions.iter().filter(move |t| t.to == mode)
    }

    /// Every name referenced by an expression, a flow target or a reset target.
    pub fn referenced_variables(&self) -> IndexSet<String> {
        let mut out = IndexSet::new();
        for mode in self.modes.values() {
            out.extend(mode.invariant.variables());
            if let Some(flow) = &mode.flow {
                for (var, rhs) in flow {
                    out.insert(var.clone());
                    out.extend(rhs.expr.variables());
                }
            }
        }
        for t in &self.transitions {
            out.extend(t.guard.variables());
            for (var, value) in &t.reset {
                out.insert(var.clone());
                out.extend(value.expr.variables());
            }
        }
        out
    }

    /// Qualified name of a variable of this component (`inst.sub.x`).
    pub fn qualified_name(&self, var: &str) -> String {
        self.path.qualify(var)
    }
}

// Validation
impl BaseComponent {
    /// Checks the structural invariants of the flat automaton.
    ///
    /// - every mode is stored under its own name
    /// - both endpoints of every transition are modes of this component
    /// - every expression references declared variables or constants only
    /// - flow and reset targets are variables
    /// - variables and constants do not share a name
    pub fn validate(&self) -> Result<()> {
        let entity = |what: String| {
            if self.path.is_root() {
                what
            } else {
                format!("{} of component '{}'", what, self.path)
            }
        };

        for name in self.constants.keys() {
            if self.variables.contains(name) {
                return Err(Error::validation(
                    entity(format!("constant '{}'", name)),
                    "declared both as variable and as constant",
                ));
            }
        }

        for (key, mode) in &self.modes {
            let mode_entity = || entity(format!("mode '{}'", key));
            if *key != mode.name {
                return Err(Error::validation(
                    mode_entity(),
                    format!("stored under a different name than '{}'", mode.name),
                ));
            }
            self.check_references(&mode.invariant, &mode_entity)?;
            if let Some(flow) = &mode.flow {
                for (var, rhs) in flow {
                    if !self.variables.contains(var) {
                        return Err(Error::validation(
                            mode_entity(),
                            format!("flow defined for undeclared variable '{}'", var),
                        ));
                    }
                    self.check_references(&rhs.expr, &mode_entity)?;
                }
            }
        }

        for t in &self.transitions {
            let t_entity = || entity(t.describe());
            for endpoint in [&t.from, &t.to] {
                if !self.modes.contains_key(endpoint) {
                    return Err(Error::validation(
                        t_entity(),
                        format!("mode '{}' is not owned by this component", endpoint),
                    ));
                }
            }
            self.check_references(&t.guard, &t_entity)?;
            for (var, value) in &t.reset {
                if !self.variables.contains(var) {
                    return Err(Error::validation(
                        t_entity(),
                        format!("reset assigns undeclared variable '{}'", var),
                    ));
                }
                self.check_references(&value.expr, &t_entity)?;
            }
        }

        Ok(())
    }

    /// Fails if `expr` references an undeclared name.
    pub fn check_references(&self, expr: &Expr, entity: &impl Fn() -> String) -> Result<()> {
        match expr.variables().into_iter().find(|v| !self.is_declared(v)) {
            Some(v) => Err(Error::validation(
                entity(),
                format!("'{}' references undeclared variable '{}'", expr, v),
            )),
            None => Ok(()),
        }
    }
}
