//! Fixed-step numeric integration of a mode's flow dynamics.
//!
//! Only the expression part of each flow is integrated; additive uncertainty intervals are
//! ignored. Variables without a flow entry are constant. Constants of the component are taken
//! at the middle of their interval.

use indexmap::{IndexMap, IndexSet};

use crate::automaton::BaseComponent;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::expr_interval::ExpressionInterval;
use crate::interval::Interval;

/// The vector field of one mode, with variables indexed in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct Dynamics<'a> {
    variables: &'a IndexSet<String>,
    constants: &'a IndexMap<String, Interval>,
    flow: &'a IndexMap<String, ExpressionInterval>,
}

impl<'a> Dynamics<'a> {
    pub fn of_mode(component: &'a BaseComponent, mode: &str) -> Result<Self> {
        let m = component
            .mode(mode)
            .ok_or_else(|| Error::unsupported(format!("mode '{}'", mode), "no such mode"))?;
        let flow = m
            .flow
            .as_ref()
            .ok_or_else(|| Error::unsupported(format!("mode '{}'", mode), "mode has no flow dynamics"))?;
        Ok(Self {
            variables: &component.variables,
            constants: &component.constants,
            flow,
        })
    }

    pub fn dimension(&self) -> usize {
        self.variables.len()
    }

    pub fn variables(&self) -> &'a IndexSet<String> {
        self.variables
    }

    pub fn flow_of(&self, var: &str) -> Option<&'a Expr> {
        self.flow.get(var).map(|rhs| &rhs.expr)
    }

    /// Value of `expr` in `state`.
    pub fn eval(&self, expr: &Expr, state: &[f64]) -> Result<f64> {
        let value = expr.eval(&|name: &str| {
            self.variables
                .get_index_of(name)
                .map(|i| state[i])
                .or_else(|| self.constants.get(name).map(Interval::middle))
        })?;
        Ok(value)
    }

    /// Interval value of `expr` over the box `state`.
    pub fn eval_interval(&self, expr: &Expr, state: &[Interval]) -> Result<Interval> {
        let value = expr.eval_interval(&|name: &str| {
            self.variables
                .get_index_of(name)
                .map(|i| state[i])
                .or_else(|| self.constants.get(name).copied())
        })?;
        Ok(value)
    }

    /// Time derivative of every variable at `state`.
    pub fn derivative(&self, state: &[f64]) -> Result<Vec<f64>> {
        self.variables
            .iter()
            .map(|var| match self.flow_of(var) {
                Some(expr) => self.eval(expr, state),
                None => Ok(0.0),
            })
            .collect()
    }

    /// Interval time derivative of every variable over the box `state`.
    pub fn derivative_interval(&self, state: &[Interval]) -> Result<Vec<Interval>> {
        self.variables
            .iter()
            .map(|var| match self.flow_of(var) {
                Some(expr) => self.eval_interval(expr, state),
                None => Ok(Interval::zero()),
            })
            .collect()
    }
}

/// One classic fourth-order Runge-Kutta step of size `h`.
pub fn rk4_step(dynamics: &Dynamics, state: &[f64], h: f64) -> Result<Vec<f64>> {
    let shifted = |base: &[f64], k: &[f64], factor: f64| -> Vec<f64> {
        base.iter().zip(k).map(|(x, d)| x + factor * d).collect()
    };
    let k1 = dynamics.derivative(state)?;
    let k2 = dynamics.derivative(&shifted(state, &k1, h / 2.0))?;
    let k3 = dynamics.derivative(&shifted(state, &k2, h / 2.0))?;
    let k4 = dynamics.derivative(&shifted(state, &k3, h))?;
    Ok((0..state.len())
        .map(|i| state[i] + h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
        .collect())
}

/// Sample times from `0` to the largest stop, with every stop hit exactly and no gap wider than
/// `max_step`.
pub fn time_grid(stops: &[f64], max_step: f64) -> Vec<f64> {
    assert!(max_step > 0.0, "max_step must be positive");
    let mut stops: Vec<f64> = stops.iter().copied().filter(|t| *t > 0.0).collect();
    stops.sort_by(f64::total_cmp);
    stops.dedup();

    let mut grid = vec![0.0];
    let mut from = 0.0;
    for stop in stops {
        let n = ((stop - from) / max_step).ceil().max(1.0) as usize;
        let h = (stop - from) / n as f64;
        for k in 1..n {
            grid.push(from + k as f64 * h);
        }
        grid.push(stop);
        from = stop;
    }
    grid
}

/// Integrates from `start` along `grid`, calling `visit(t, state)` at every grid time
/// (including `t = 0`).
pub fn simulate(
    dynamics: &Dynamics,
    start: &[f64],
    grid: &[f64],
    mut visit: impl FnMut(f64, &[f64]) -> Result<()>,
) -> Result<Vec<f64>> {
    if start.len() != dynamics.dimension() {
        return Err(Error::BackendFailed(format!(
            "start point has {} coordinates, the automaton has {} variables",
            start.len(),
            dynamics.dimension()
        )));
    }
    let mut state = start.to_vec();
    let mut time = grid.first().copied().unwrap_or(0.0);
    visit(time, &state)?;
    for &next in grid.iter().skip(1) {
        state = rk4_step(dynamics, &state, next - time)?;
        if state.iter().any(|x| !x.is_finite()) {
            return Err(Error::BackendFailed(format!("simulation diverged at t = {}", next)));
        }
        time = next;
        visit(time, &state)?;
    }
    Ok(state)
}
