//! Derivative range estimation.
//!
//! A [`RangeEstimator`] answers: while a trajectory started at a [`SymbolicStatePoint`]
//! evolves under the flow of its mode, which values does `d(variable)/dt` take inside each
//! time window? The answer is one interval per window.
//!
//! The estimate is *not* a formal bound. Three backends are provided:
//!
//! - [`SimulationEstimator`] integrates one trajectory with RK4 and records the extremes of the
//!   derivative expression at every sample (the default).
//! - [`IntervalEstimator`] propagates a box with a first-order interval enclosure and evaluates
//!   the derivative expression with interval arithmetic. Wider, but formula-based.
//! - [`UnavailableEstimator`] refuses every request with [`Error::BackendUnavailable`], which is
//!   how a disabled numeric backend is modelled.
//!
//! ```
//! use hybrid_rs::estimator::{RangeEstimator, SimulationEstimator, SymbolicStatePoint};
//! use hybrid_rs::generate::debug_configuration;
//! use hybrid_rs::interval::Interval;
//!
//! let config = debug_configuration(&[["t", "1", "0"], ["y", "sin(t)", "0"]]).unwrap();
//! let start = SymbolicStatePoint::new("on", vec![0.0, 0.0]);
//! let windows = [Interval::new(0.0, std::f64::consts::PI)];
//! let ranges = SimulationEstimator::default()
//!     .estimate_range(&config, "y", &start, &windows)
//!     .unwrap();
//! assert!(ranges[0].approx_eq(&Interval::new(0.0, 1.0), 1e-6));
//! ```

use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::expr::{BinaryOp, Expr};
use crate::interval::Interval;
use crate::simulate::{simulate, time_grid, Dynamics};

/// A point of the continuous state space, one coordinate per variable in declaration order.
pub type HyperPoint = Vec<f64>;

/// A concrete start state: a mode and a point.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicStatePoint {
    pub mode: String,
    pub point: HyperPoint,
}

impl SymbolicStatePoint {
    pub fn new(mode: impl Into<String>, point: HyperPoint) -> Self {
        Self {
            mode: mode.into(),
            point,
        }
    }
}

pub trait RangeEstimator: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// One interval per window, covering the observed values of `d(variable)/dt` as defined by
    /// the flow of `start.mode`, for a trajectory starting at `start.point` at time `0`.
    fn estimate_range(
        &self,
        config: &Configuration,
        variable: &str,
        start: &SymbolicStatePoint,
        windows: &[Interval],
    ) -> Result<Vec<Interval>>;
}

fn check_windows(windows: &[Interval]) -> Result<()> {
    match windows.iter().find(|w| w.min < 0.0 || !w.is_bounded()) {
        Some(w) => Err(Error::BackendFailed(format!("invalid time window {}", w))),
        None => Ok(()),
    }
}

fn derivative_expression<'a>(dynamics: &Dynamics<'a>, variable: &str) -> Result<&'a Expr> {
    dynamics.flow_of(variable).ok_or_else(|| {
        Error::unsupported(
            format!("variable '{}'", variable),
            "not present in the flow of the start mode",
        )
    })
}

/// Simulation-based estimation with fixed-step RK4.
#[derive(Debug, Clone)]
pub struct SimulationEstimator {
    /// Largest integration step.
    pub max_step: f64,
}

impl Default for SimulationEstimator {
    fn default() -> Self {
        Self { max_step: 0.001 }
    }
}

impl RangeEstimator for SimulationEstimator {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn estimate_range(
        &self,
        config: &Configuration,
        variable: &str,
        start: &SymbolicStatePoint,
        windows: &[Interval],
    ) -> Result<Vec<Interval>> {
        check_windows(windows)?;
        let base = config.root_base()?;
        let dynamics = Dynamics::of_mode(base, &start.mode)?;
        let expr = derivative_expression(&dynamics, variable)?;
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let stops: Vec<f64> = windows.iter().flat_map(|w| [w.min, w.max]).collect();
        let grid = time_grid(&stops, self.max_step);
        debug!(
            "Simulating mode '{}' from {:?} over {} samples for {}'",
            start.mode,
            start.point,
            grid.len(),
            variable
        );

        let mut ranges: Vec<Option<Interval>> = vec![None; windows.len()];
        simulate(&dynamics, &start.point, &grid, |t, state| {
            let value = dynamics.eval(expr, state)?;
            if !value.is_finite() {
                return Err(Error::BackendFailed(format!(
                    "derivative of '{}' is not finite at t = {}",
                    variable, t
                )));
            }
            for (range, window) in ranges.iter_mut().zip(windows) {
                if window.contains(t) {
                    *range = Some(match range {
                        Some(r) => r.hull_value(value),
                        None => Interval::point(value),
                    });
                }
            }
            Ok(())
        })?;

        collect_ranges(ranges, windows)
    }
}

fn collect_ranges(ranges: Vec<Option<Interval>>, windows: &[Interval]) -> Result<Vec<Interval>> {
    ranges
        .into_iter()
        .zip(windows)
        .map(|(r, w)| r.ok_or_else(|| Error::BackendFailed(format!("no samples inside window {}", w))))
        .collect()
}

/// Formula-based estimation by first-order interval propagation.
///
/// Over a step of size `h` starting from the box `X`, the state is enclosed by
/// `S = X + [0, h] * F(E)` where `E = hull(X, X + [0, h] * F(X))`, slightly widened; the next box
/// is `X + h * F(E)`. The derivative expression is evaluated over `S` with interval arithmetic.
#[derive(Debug, Clone)]
pub struct IntervalEstimator {
    pub step: f64,
}

impl Default for IntervalEstimator {
    fn default() -> Self {
        Self { step: 0.001 }
    }
}

impl RangeEstimator for IntervalEstimator {
    fn name(&self) -> &'static str {
        "interval"
    }

    fn estimate_range(
        &self,
        config: &Configuration,
        variable: &str,
        start: &SymbolicStatePoint,
        windows: &[Interval],
    ) -> Result<Vec<Interval>> {
        check_windows(windows)?;
        let base = config.root_base()?;
        let dynamics = Dynamics::of_mode(base, &start.mode)?;
        let expr = derivative_expression(&dynamics, variable)?;
        if start.point.len() != dynamics.dimension() {
            return Err(Error::BackendFailed(format!(
                "start point has {} coordinates, the automaton has {} variables",
                start.point.len(),
                dynamics.dimension()
            )));
        }
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let stops: Vec<f64> = windows.iter().flat_map(|w| [w.min, w.max]).collect();
        let grid = time_grid(&stops, self.step);
        let mut ranges: Vec<Option<Interval>> = vec![None; windows.len()];
        let record = |span: Interval, value: Interval, ranges: &mut Vec<Option<Interval>>| {
            for (range, window) in ranges.iter_mut().zip(windows) {
                let overlaps = span.min <= window.max && window.min <= span.max;
                if overlaps {
                    *range = Some(match range {
                        Some(r) => r.hull(&value),
                        None => value,
                    });
                }
            }
        };

        let mut state: Vec<Interval> = start.point.iter().copied().map(Interval::point).collect();
        record(
            Interval::point(0.0),
            dynamics.eval_interval(expr, &state)?,
            &mut ranges,
        );
        for pair in grid.windows(2) {
            let h = pair[1] - pair[0];
            let elapsed = Interval::new(0.0, h);
            let f0 = dynamics.derivative_interval(&state)?;
            let rough: Vec<Interval> = state
                .iter()
                .zip(&f0)
                .map(|(x, f)| x.hull(&(*x + elapsed * *f)).bloat(1e-9 + 0.1 * (elapsed * *f).width()))
                .collect();
            let f1 = dynamics.derivative_interval(&rough)?;
            let enclosure: Vec<Interval> = state.iter().zip(&f1).map(|(x, f)| *x + elapsed * *f).collect();
            if enclosure.iter().any(|i| !i.is_bounded()) {
                return Err(Error::BackendFailed(format!(
                    "interval enclosure of mode '{}' blew up at t = {}",
                    start.mode, pair[1]
                )));
            }
            let value = dynamics.eval_interval(expr, &enclosure)?;
            record(Interval::new(pair[0], pair[1]), value, &mut ranges);
            state = state
                .iter()
                .zip(&f1)
                .map(|(x, f)| *x + Interval::point(h) * *f)
                .collect();
        }

        collect_ranges(ranges, windows)
    }
}

/// A backend that is switched off.
#[derive(Debug, Clone)]
pub struct UnavailableEstimator {
    pub reason: String,
}

impl UnavailableEstimator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl RangeEstimator for UnavailableEstimator {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn estimate_range(
        &self,
        _config: &Configuration,
        variable: &str,
        start: &SymbolicStatePoint,
        _windows: &[Interval],
    ) -> Result<Vec<Interval>> {
        Err(Error::BackendUnavailable(format!(
            "cannot estimate {}' in mode '{}': {}",
            variable, start.mode, self.reason
        )))
    }
}

/// Bounding box of a region formula over `variables`.
///
/// Only top-level conjuncts comparing one variable with a variable-free term contribute; other
/// conjuncts are ignored. Unconstrained directions default to `[0, 0]`. A direction bounded on
/// one side only, or with an empty range, is an error.
pub fn region_box(
    region: &Expr,
    variables: &IndexSet<String>,
    constants: &IndexMap<String, Interval>,
) -> Result<Vec<Interval>> {
    let mut lower = vec![f64::NEG_INFINITY; variables.len()];
    let mut upper = vec![f64::INFINITY; variables.len()];
    let constant = |e: &Expr| -> Option<f64> {
        e.eval(&|name: &str| constants.get(name).map(Interval::middle)).ok()
    };

    for conjunct in region.conjuncts() {
        let Expr::Binary(op, lhs, rhs) = conjunct else {
            continue;
        };
        if !op.is_comparison() || *op == BinaryOp::Ne {
            continue;
        }
        let (var, op, bound) = match (lhs.as_var(), rhs.as_var()) {
            (Some(v), _) if variables.contains(v) => (v, *op, constant(&**rhs)),
            (_, Some(v)) if variables.contains(v) => (v, op.mirror(), constant(&**lhs)),
            _ => {
                debug!("Ignoring conjunct '{}' when bounding the region", conjunct);
                continue;
            }
        };
        let (Some(i), Some(bound)) = (variables.get_index_of(var), bound) else {
            continue;
        };
        match op {
            BinaryOp::Eq => {
                lower[i] = lower[i].max(bound);
                upper[i] = upper[i].min(bound);
            }
            BinaryOp::Le | BinaryOp::Lt => upper[i] = upper[i].min(bound),
            BinaryOp::Ge | BinaryOp::Gt => lower[i] = lower[i].max(bound),
            _ => {}
        }
    }

    variables
        .iter()
        .enumerate()
        .map(|(i, var)| match (lower[i].is_finite(), upper[i].is_finite()) {
            (true, true) => Interval::try_new(lower[i], upper[i]).ok_or_else(|| {
                Error::unsupported(format!("variable '{}'", var), "region bounds are contradictory")
            }),
            (false, false) => {
                warn!("Region '{}' does not constrain '{}', assuming 0", region, var);
                Ok(Interval::zero())
            }
            _ => Err(Error::unsupported(
                format!("variable '{}'", var),
                format!("region '{}' bounds it on one side only", region),
            )),
        })
        .collect()
}

/// The center of a box.
pub fn box_center(bounds: &[Interval]) -> HyperPoint {
    bounds.iter().map(Interval::middle).collect()
}

/// The `2n` points obtained by moving one coordinate of the center to either face of the box.
pub fn star_points(bounds: &[Interval]) -> Vec<HyperPoint> {
    let center = box_center(bounds);
    let mut out = Vec::with_capacity(2 * bounds.len());
    for (i, b) in bounds.iter().enumerate() {
        for face in [b.min, b.max] {
            let mut p = center.clone();
            p[i] = face;
            out.push(p);
        }
    }
    out
}
