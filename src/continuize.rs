//! Continuization: replace a sampled control input by its continuous counterpart plus bounded
//! sampling error, window by window.
//!
//! Let `u` be a variable whose value is produced by a controller sampled with period `P`, and
//! whose flow `u' = e_u` describes how the *continuous* control law evolves. Replacing the
//! sampled value by the continuous one is off by at most `P * u'`, so for every time window `i`
//! the engine:
//!
//! 1. estimates the range of `e_u` over the window ([`RangeEstimator`][crate::estimator::RangeEstimator]),
//! 2. bloats it by the window's bloat amount, `K_i = [lo - β_i, hi + β_i]`,
//! 3. computes the sampling error `δ_i = [-P, 0] * K_i`,
//! 4. creates a copy of the mode for the window in which every flow `y' = e_y` mentioning `u`
//!    (affinely, with constant coefficient `c_y`) becomes `e_y + c_y * δ_i`,
//! 5. adds two urgent error modes per window, entered when `e_u` leaves `K_i` from below or from
//!    above; reaching one of them means the estimate was unsound.
//!
//! A sampled input that is later replaced by its sampling law (the time-triggered variant) uses
//! [`RangeTarget::Value`] instead: the range of `u` itself is estimated, and the error modes
//! watch `u` rather than `e_u`.
//!
//! Windows are chained on a shared time variable: window `i` is `[b_{i-1}, b_i]` (with
//! `b_{-1} = 0`), its mode carries the invariant `t <= b_i + P` (and `t >= b_{i-1}` for `i > 0`),
//! and the jump to the next window is guarded by `t >= b_i`.
//!
//! Estimation for every (mode, start point) pair runs in parallel before the model is touched.
//! The whole transformation happens on a private copy that replaces the input only on success.

use indexmap::IndexMap;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::automaton::{AutomatonMode, AutomatonTransition, BaseComponent};
use crate::config::Configuration;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::estimator::{box_center, region_box, star_points, HyperPoint, SymbolicStatePoint};
use crate::expr::{BinaryOp, Expr};
use crate::expr_interval::ExpressionInterval;
use crate::interval::Interval;

/// Which quantity the estimated range of a window bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeTarget {
    /// The derivative `u' = e_u`.
    #[default]
    Derivative,
    /// The value of `u`.
    Value,
}

/// What to continuize and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuizationParams {
    /// The sampled variable `u`.
    pub variable: String,
    /// Clock tracking global time; found or introduced when `None`.
    pub time_variable: Option<String>,
    /// Sampling period `P`.
    pub period: f64,
    /// Also estimate from the `2n` star points of the start box.
    pub blowup: bool,
    /// Window upper bounds `b_0 < b_1 < ...`.
    pub breakpoints: Vec<f64>,
    /// One bloat amount per window.
    pub bloats: Vec<f64>,
    pub target: RangeTarget,
}

impl ContinuizationParams {
    /// Checks the numeric parameters, reporting problems as parameter errors of `pass`.
    pub fn check(&self, pass: &str) -> Result<()> {
        if self.variable.is_empty() {
            return Err(Error::params(pass, "no variable to continuize"));
        }
        if !(self.period.is_finite() && self.period > 0.0) {
            return Err(Error::params(pass, format!("period must be positive, got '{}'", self.period)));
        }
        if self.breakpoints.is_empty() {
            return Err(Error::params(pass, "at least one time breakpoint is required"));
        }
        let mut previous = 0.0;
        for &b in &self.breakpoints {
            if !(b.is_finite() && b > previous) {
                return Err(Error::params(
                    pass,
                    format!("time breakpoints must be positive and strictly increasing, got '{}'", b),
                ));
            }
            previous = b;
        }
        if self.bloats.len() != self.breakpoints.len() {
            return Err(Error::params(
                pass,
                format!(
                    "{} bloat amount(s) given for {} time window(s)",
                    self.bloats.len(),
                    self.breakpoints.len()
                ),
            ));
        }
        if let Some(b) = self.bloats.iter().find(|b| !(b.is_finite() && **b >= 0.0)) {
            return Err(Error::params(pass, format!("bloat amounts must be non-negative, got '{}'", b)));
        }
        Ok(())
    }

    /// `[0, b_0], [b_0, b_1], ...`
    pub fn windows(&self) -> Vec<Interval> {
        let mut lower = 0.0;
        self.breakpoints
            .iter()
            .map(|&b| {
                let w = Interval::new(lower, b);
                lower = b;
                w
            })
            .collect()
    }
}

/// The range installed for one window of one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRange {
    /// The continuized mode the window was derived from.
    pub mode: String,
    /// The synthesized mode for this window.
    pub window_mode: String,
    pub window: Interval,
    /// Estimated range of `u'` or `u` (hull over all start points).
    pub raw: Interval,
    /// `raw` bloated by the window's bloat amount.
    pub bloated: Interval,
}

/// Name of the mode for window `index` of `mode`: `on`, `on_2`, `on_3`, ...
pub fn window_mode_name(mode: &str, index: usize) -> String {
    if index == 0 {
        mode.to_string()
    } else {
        format!("{}_{}", mode, index + 1)
    }
}

/// The two error modes guarding a window mode.
pub fn error_mode_names(window_mode: &str) -> [String; 2] {
    [
        format!("{}_error_lower", window_mode),
        format!("{}_error_upper", window_mode),
    ]
}

/// Applies the transformation to the flat root of `config`.
///
/// `pass` names the calling pass in parameter diagnostics. On error `config` is left unchanged.
pub fn continuize(
    config: &mut Configuration,
    params: &ContinuizationParams,
    ctx: &Context,
    pass: &str,
) -> Result<Vec<WindowRange>> {
    params.check(pass)?;
    let u = params.variable.as_str();

    let mut prepared = config.clone();
    let targets = continuized_modes(prepared.root_base()?, u, pass)?;
    let time = resolve_time_variable(&mut prepared, params.time_variable.as_deref(), u, pass)?;
    let windows = params.windows();
    info!(
        "Continuizing '{}' in mode(s) {:?} over {} window(s), time variable '{}'",
        u,
        targets,
        windows.len(),
        time
    );

    let raw = estimate_ranges(&prepared, &targets, u, &windows, params, ctx)?;
    let report = synthesize(&mut prepared, params, &time, &windows, &raw)?;

    *config = prepared;
    Ok(report)
}

/// Non-urgent modes whose flow defines `u`.
fn continuized_modes(base: &BaseComponent, u: &str, pass: &str) -> Result<Vec<String>> {
    if !base.variables.contains(u) {
        return Err(Error::params(pass, format!("variable '{}' is not declared", u)));
    }
    let targets: Vec<String> = base
        .modes
        .values()
        .filter(|m| !m.urgent && m.flow_of(u).is_some())
        .map(|m| m.name.clone())
        .collect();
    if targets.is_empty() {
        return Err(Error::unsupported(
            format!("variable '{}'", u),
            "not present in any mode's flow",
        ));
    }
    Ok(targets)
}

/// Finds the time variable, introducing it (flow `1`, initially `0`) if needed.
fn resolve_time_variable(config: &mut Configuration, requested: Option<&str>, u: &str, pass: &str) -> Result<String> {
    let base = config.root_base()?;
    let name = match requested {
        Some(t) if t == u => {
            return Err(Error::params(pass, format!("'{}' cannot be both the continuized and the time variable", t)));
        }
        Some(t) if base.variables.contains(t) => {
            let not_clock = base.modes.values().find(|m| m.has_flow() && !m.is_clock(t));
            if let Some(m) = not_clock {
                return Err(Error::params(
                    pass,
                    format!("time variable '{}' does not have flow 1 in mode '{}'", t, m.name),
                ));
            }
            return Ok(t.to_string());
        }
        Some(t) => t.to_string(),
        None => {
            let clock = base
                .variables
                .iter()
                .filter(|v| v.as_str() != u)
                .find(|v| base.modes.values().filter(|m| m.has_flow()).all(|m| m.is_clock(v)));
            if let Some(clock) = clock {
                return Ok(clock.clone());
            }
            let mut candidate = "t".to_string();
            let mut k = 2;
            while base.is_declared(&candidate) {
                candidate = format!("t_{}", k);
                k += 1;
            }
            candidate
        }
    };

    info!("Introducing time variable '{}'", name);
    let base = config.root_base_mut()?;
    base.add_variable(name.clone());
    for mode in base.modes.values_mut().filter(|m| m.has_flow()) {
        mode.set_flow(name.clone(), Expr::num(1.0));
    }
    for region in config.init.values_mut() {
        *region = region.clone().and(Expr::var(name.clone()).equals(Expr::num(0.0)));
    }
    Ok(name)
}

/// Representative start points of `mode`.
///
/// Initial modes start from the center of their initial box. Other modes start from the reset
/// of a transition entering them from an initial mode, applied to that mode's box center.
fn start_points(config: &Configuration, mode: &str, blowup: bool) -> Result<Vec<HyperPoint>> {
    let base = config.root_base()?;
    let points_of = |region: &Expr| -> Result<Vec<HyperPoint>> {
        let bounds = region_box(region, &base.variables, &base.constants)?;
        let mut points = vec![box_center(&bounds)];
        if blowup {
            points.extend(star_points(&bounds));
        }
        Ok(points)
    };

    if let Some(region) = config.init.get(mode) {
        return points_of(region);
    }
    let entry = base
        .transitions
        .iter()
        .find(|t| t.to == mode && t.from != mode && config.init.contains_key(&t.from));
    match entry {
        Some(t) => points_of(&config.init[&t.from])?
            .iter()
            .map(|p| apply_reset(base, t, p))
            .collect(),
        None => Err(Error::unsupported(
            format!("mode '{}'", mode),
            "cannot derive a start state: not initial and not entered from an initial mode",
        )),
    }
}

fn apply_reset(base: &BaseComponent, transition: &AutomatonTransition, point: &[f64]) -> Result<HyperPoint> {
    let env = |name: &str| {
        base.variables
            .get_index_of(name)
            .map(|i| point[i])
            .or_else(|| base.constants.get(name).map(Interval::middle))
    };
    base.variables
        .iter()
        .enumerate()
        .map(|(i, var)| match transition.reset.get(var) {
            Some(value) => {
                let offset = value.interval.map_or(0.0, |i| i.middle());
                Ok(value.expr.eval(&env)? + offset)
            }
            None => Ok(point[i]),
        })
        .collect()
}

/// Estimated range of the target quantity per window for every target mode, hulled over its
/// start points.
fn estimate_ranges(
    config: &Configuration,
    targets: &[String],
    u: &str,
    windows: &[Interval],
    params: &ContinuizationParams,
    ctx: &Context,
) -> Result<IndexMap<String, Vec<Interval>>> {
    let mut jobs = Vec::new();
    for mode in targets {
        for point in start_points(config, mode, params.blowup)? {
            jobs.push(SymbolicStatePoint::new(mode.clone(), point));
        }
    }

    // The estimator bounds derivatives, so the value of `u` is observed through an extra
    // variable whose flow is `u`.
    let observed;
    let (config, u) = match params.target {
        RangeTarget::Derivative => (config, u.to_string()),
        RangeTarget::Value => {
            let (extended, observer) = with_observer(config, u)?;
            for job in &mut jobs {
                job.point.push(0.0);
            }
            observed = extended;
            (&observed, observer)
        }
    };
    let u = u.as_str();
    debug!(
        "Running {} range estimation(s) with the '{}' backend",
        jobs.len(),
        ctx.estimator.name()
    );

    let results: Vec<Vec<Interval>> = jobs
        .par_iter()
        .map(|start| ctx.estimator.estimate_range(config, u, start, windows))
        .collect::<Result<_>>()?;

    let mut ranges: IndexMap<String, Vec<Interval>> = IndexMap::new();
    for (start, result) in jobs.iter().zip(results) {
        if result.len() != windows.len() {
            return Err(Error::BackendFailed(format!(
                "'{}' returned {} range(s) for {} window(s)",
                ctx.estimator.name(),
                result.len(),
                windows.len()
            )));
        }
        match ranges.get_mut(&start.mode) {
            Some(acc) => {
                for (a, r) in acc.iter_mut().zip(&result) {
                    *a = a.hull(r);
                }
            }
            None => {
                ranges.insert(start.mode.clone(), result);
            }
        }
    }
    Ok(ranges)
}

/// A copy of `config` with a fresh variable whose flow is `u` in every flowing mode.
fn with_observer(config: &Configuration, u: &str) -> Result<(Configuration, String)> {
    let mut extended = config.clone();
    let base = extended.root_base_mut()?;
    let mut name = format!("{}_value", u);
    let mut k = 2;
    while base.is_declared(&name) {
        name = format!("{}_value_{}", u, k);
        k += 1;
    }
    base.add_variable(name.clone());
    for mode in base.modes.values_mut().filter(|m| m.has_flow()) {
        mode.set_flow(name.clone(), Expr::var(u));
    }
    Ok((extended, name))
}

/// Replaces every continuized mode by its window modes, error modes and transitions.
fn synthesize(
    config: &mut Configuration,
    params: &ContinuizationParams,
    time: &str,
    windows: &[Interval],
    raw: &IndexMap<String, Vec<Interval>>,
) -> Result<Vec<WindowRange>> {
    let u = params.variable.as_str();
    let original = config.root_base()?.clone();
    let clock = || Expr::var(time);

    let mut report = Vec::new();
    let mut modes = IndexMap::new();
    let mut added = Vec::new();

    for (name, mode) in &original.modes {
        let Some(ranges) = raw.get(name) else {
            modes.insert(name.clone(), mode.clone());
            continue;
        };
        let e_u = mode
            .flow_of(u)
            .map(|rhs| rhs.expr.clone())
            .ok_or_else(|| Error::unsupported(format!("mode '{}'", name), format!("no flow for '{}'", u)))?;
        let watched = match params.target {
            RangeTarget::Derivative => e_u,
            RangeTarget::Value => Expr::var(u),
        };

        for (i, window) in windows.iter().enumerate() {
            let window_name = window_mode_name(name, i);
            let [lower_name, upper_name] = error_mode_names(&window_name);
            for synthesized in [&window_name, &lower_name, &upper_name] {
                if synthesized != name && original.modes.contains_key(synthesized) {
                    return Err(Error::unsupported(
                        format!("mode '{}'", synthesized),
                        "name is already taken, cannot synthesize a window mode",
                    ));
                }
            }

            let bloated = ranges[i].bloat(params.bloats[i]);
            let delta = Interval::new(-params.period, 0.0) * bloated;
            debug!(
                "Mode '{}', window {}: {}' in {}, bloated {}, sampling error {}",
                window_name, window, u, ranges[i], bloated, delta
            );

            let mut window_mode = mode.clone();
            window_mode.name = window_name.clone();
            if let Some(flow) = &mut window_mode.flow {
                for (y, rhs) in flow.iter_mut() {
                    if !rhs.expr.mentions(u) {
                        continue;
                    }
                    let c = rhs.expr.linear_coefficient(u).ok_or_else(|| {
                        Error::unsupported(
                            format!("mode '{}'", name),
                            format!("flow of '{}' is not affine in '{}'", y, u),
                        )
                    })?;
                    *rhs = rhs.clone().with_added_interval(delta * c);
                }
            }
            let mut invariant = mode.invariant.clone();
            if i > 0 {
                invariant = invariant.and(clock().ge(Expr::num(window.min)));
            }
            window_mode.invariant = invariant.and(clock().le(Expr::num(window.max + params.period)));
            modes.insert(window_name.clone(), window_mode);

            for error_name in [&lower_name, &upper_name] {
                modes.insert(error_name.clone(), AutomatonMode::new_urgent(error_name.clone()));
            }
            added.push(
                AutomatonTransition::new(window_name.clone(), lower_name)
                    .with_guard(watched.clone().lt(Expr::num(bloated.min))),
            );
            added.push(
                AutomatonTransition::new(window_name.clone(), upper_name)
                    .with_guard(watched.clone().gt(Expr::num(bloated.max))),
            );
            if i + 1 < windows.len() {
                added.push(
                    AutomatonTransition::new(window_name.clone(), window_mode_name(name, i + 1))
                        .with_guard(clock().ge(Expr::num(window.max))),
                );
            }

            report.push(WindowRange {
                mode: name.clone(),
                window_mode: window_name,
                window: *window,
                raw: ranges[i],
                bloated,
            });
        }
    }

    let span = |i: usize| {
        let upper = clock().le(Expr::num(windows[i].max));
        if i == 0 {
            upper
        } else {
            clock().ge(Expr::num(windows[i].min)).and(upper)
        }
    };
    let mut transitions = Vec::new();
    for t in &original.transitions {
        match (raw.contains_key(&t.from), raw.contains_key(&t.to)) {
            (true, true) => transitions.extend((0..windows.len()).map(|i| AutomatonTransition {
                from: window_mode_name(&t.from, i),
                to: window_mode_name(&t.to, i),
                ..t.clone()
            })),
            (true, false) => transitions.extend((0..windows.len()).map(|i| AutomatonTransition {
                from: window_mode_name(&t.from, i),
                ..t.clone()
            })),
            (false, true) => transitions.extend((0..windows.len()).map(|i| AutomatonTransition {
                to: window_mode_name(&t.to, i),
                guard: t.guard.clone().and(span(i)),
                ..t.clone()
            })),
            (false, false) => transitions.push(t.clone()),
        }
    }
    transitions.extend(added);

    let mut forbidden = IndexMap::new();
    for (mode, region) in &config.forbidden {
        forbidden.insert(mode.clone(), region.clone());
        if raw.contains_key(mode) {
            for i in 1..windows.len() {
                forbidden.insert(window_mode_name(mode, i), region.clone());
            }
        }
    }
    config.forbidden = forbidden;

    let base = config.root_base_mut()?;
    base.modes = modes;
    base.transitions = transitions;
    Ok(report)
}

/// Parameters of the time-triggered variant.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTriggeredParams {
    pub blowup: bool,
    /// Macro step `T`; must be a multiple of the sampling period.
    pub step: f64,
    /// Bloat amount used for every macro window.
    pub bloat: f64,
}

/// A periodic sampling self-loop: `clock >= P` resets `clock := 0` and `u := law`.
#[derive(Debug, Clone, PartialEq)]
struct SampledLoop {
    mode: String,
    clock: String,
    period: f64,
    variable: String,
    law: Expr,
}

/// Most windows a time-triggered run may create.
pub const MAX_MACRO_WINDOWS: usize = 10_000;

/// Continuizes a model that samples `u := f(x)` on a fixed-period clock.
///
/// The sampling loops are removed and `u` gets the flow `u' = df/dt` along the plant dynamics,
/// so that `u` tracks `f` exactly, and the clock disappears. The event-triggered engine then runs
/// with windows `[0, T], [T, 2T], ...` up to the time horizon, bounding the *values* of `u`.
/// Finally `u` is replaced by `f` in every expression of the window modes and their outgoing
/// transitions, except in the flow of `u` itself.
pub fn continuize_time_triggered(
    config: &mut Configuration,
    params: &TimeTriggeredParams,
    ctx: &Context,
    pass: &str,
) -> Result<Vec<WindowRange>> {
    if !(params.step.is_finite() && params.step > 0.0) {
        return Err(Error::params(pass, format!("macro step must be positive, got '{}'", params.step)));
    }
    if !(params.bloat.is_finite() && params.bloat >= 0.0) {
        return Err(Error::params(pass, format!("bloat amount must be non-negative, got '{}'", params.bloat)));
    }
    let horizon = config.settings.time_horizon;
    if !(horizon.is_finite() && horizon > 0.0) {
        return Err(Error::unsupported(
            "settings",
            format!("time horizon must be finite and positive, got {}", horizon),
        ));
    }
    let count = (horizon / params.step - 1e-9).ceil().max(1.0);
    if count > MAX_MACRO_WINDOWS as f64 {
        return Err(Error::params(
            pass,
            format!(
                "macro step {} splits the horizon {} into {} windows, at most {} are supported",
                params.step, horizon, count, MAX_MACRO_WINDOWS
            ),
        ));
    }
    let count = count as usize;

    let mut prepared = config.clone();
    let base = prepared.root_base()?;
    let loops: Vec<SampledLoop> = base
        .transitions
        .iter()
        .filter(|t| t.is_self_loop() && !t.reset.is_empty())
        .map(|t| recognize_loop(base, t))
        .collect::<Result<_>>()?;
    let Some(first) = loops.first() else {
        return Err(Error::unsupported("configuration", "no periodic sampling self-loop found"));
    };
    let (clock, u, period) = (first.clock.clone(), first.variable.clone(), first.period);
    if let Some(other) = loops
        .iter()
        .find(|l| l.clock != clock || l.variable != u || (l.period - period).abs() > ctx.tolerance)
    {
        return Err(Error::unsupported(
            format!("mode '{}'", other.mode),
            format!("sampling loop differs from the one in mode '{}'", first.mode),
        ));
    }
    let mut laws = IndexMap::new();
    for l in &loops {
        if laws.insert(l.mode.clone(), l.law.clone()).is_some() {
            return Err(Error::unsupported(format!("mode '{}'", l.mode), "more than one sampling loop"));
        }
    }
    let ratio = params.step / period;
    if ratio.round() < 1.0 || (ratio - ratio.round()).abs() > 1e-6 {
        return Err(Error::params(
            pass,
            format!("macro step {} is not a multiple of the sampling period {}", params.step, period),
        ));
    }
    info!(
        "Found sampling of '{}' every {} on clock '{}' in {} mode(s)",
        u,
        period,
        clock,
        laws.len()
    );

    let base = prepared.root_base_mut()?;
    base.transitions.retain(|t| !(t.is_self_loop() && !t.reset.is_empty()));
    for (name, law) in &laws {
        let Some(mode) = base.modes.get_mut(name) else {
            continue;
        };
        let flows: Vec<(String, Expr)> = mode
            .flow
            .iter()
            .flatten()
            .map(|(v, rhs)| (v.clone(), rhs.expr.clone()))
            .collect();
        let rate = law.lie_derivative(flows.iter().map(|(v, e)| (v.as_str(), e)))?;
        debug!("Mode '{}': {}' = {}", name, u, rate);
        mode.set_flow(u.clone(), rate);
    }

    let strip = |e: &Expr| e.without_conjuncts_mentioning(&clock);
    for mode in base.modes.values_mut() {
        mode.invariant = strip(&mode.invariant);
        if let Some(flow) = &mut mode.flow {
            flow.shift_remove(&clock);
        }
    }
    for t in &mut base.transitions {
        t.guard = strip(&t.guard);
        t.reset.shift_remove(&clock);
    }
    if !base.remove_variable_if_unused(&clock) {
        warn!("Clock '{}' is still referenced and stays declared", clock);
    }
    for region in prepared.init.values_mut().chain(prepared.forbidden.values_mut()) {
        *region = strip(region);
    }

    let windows = ContinuizationParams {
        variable: u.clone(),
        time_variable: None,
        period,
        blowup: params.blowup,
        breakpoints: (1..=count).map(|k| k as f64 * params.step).collect(),
        bloats: vec![params.bloat; count],
        target: RangeTarget::Value,
    };
    let report = continuize(&mut prepared, &windows, ctx, pass)?;

    let origin: IndexMap<&str, &Expr> = report
        .iter()
        .filter_map(|r| laws.get(&r.mode).map(|law| (r.window_mode.as_str(), law)))
        .collect();
    let base = prepared.root_base_mut()?;
    for (name, mode) in base.modes.iter_mut() {
        let Some(law) = origin.get(name.as_str()) else {
            continue;
        };
        mode.invariant = mode.invariant.substitute(&u, law);
        for (y, rhs) in mode.flow.iter_mut().flatten() {
            if *y != u {
                rhs.expr = rhs.expr.substitute(&u, law);
            }
        }
    }
    for t in &mut base.transitions {
        if let Some(law) = origin.get(t.from.as_str()) {
            t.map_expressions(&mut |e| e.substitute(&u, law));
        }
    }

    *config = prepared;
    Ok(report)
}

fn recognize_loop(base: &BaseComponent, t: &AutomatonTransition) -> Result<SampledLoop> {
    let unsupported = |message: String| Error::unsupported(t.describe(), message);
    let mode = base
        .mode(&t.from)
        .ok_or_else(|| unsupported(format!("mode '{}' does not exist", t.from)))?;

    let clocks: Vec<&String> = t
        .reset
        .iter()
        .filter(|(v, rhs)| rhs.is_exact() && rhs.expr.as_num() == Some(0.0) && mode.is_clock(v))
        .map(|(v, _)| v)
        .collect();
    let [clock] = clocks.as_slice() else {
        return Err(unsupported("expected exactly one clock reset to 0".into()));
    };

    let mut period = None;
    for c in t.guard.conjuncts() {
        match c {
            Expr::Binary(BinaryOp::Ge, lhs, rhs) if lhs.as_var() == Some(clock.as_str()) => period = rhs.as_num(),
            c if c.is_true() => {}
            c => return Err(unsupported(format!("guard conjunct '{}' is not a sampling condition", c))),
        }
    }
    let period = period
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| unsupported(format!("guard must be '{} >= <period>'", clock)))?;

    let sampled: Vec<(&String, &ExpressionInterval)> = t.reset.iter().filter(|(v, _)| v != clock).collect();
    let [(u, law)] = sampled.as_slice() else {
        return Err(unsupported("expected exactly one sampled variable".into()));
    };
    let held = matches!(mode.flow_of(u), Some(rhs) if rhs.is_exact() && rhs.expr.as_num() == Some(0.0));
    if !held || !law.is_exact() {
        return Err(unsupported(format!(
            "sampled variable '{}' must have flow 0 and an exact reset",
            u
        )));
    }
    Ok(SampledLoop {
        mode: mode.name.clone(),
        clock: clock.to_string(),
        period,
        variable: u.to_string(),
        law: law.expr.clone(),
    })
}
