//! Model transformation passes.
//!
//! A pass rewrites a [`Configuration`] in place according to a parameter string. Every pass is
//! registered under a stable command-line flag:
//!
//! | Flag | Pass | Effect |
//! |------|------|--------|
//! | `sub_constants` | [`SubstituteConstantsPass`] | inline constants with a point value |
//! | `simplify` | [`SimplifyExpressionsPass`] | simplify every expression |
//! | `flatten` | [`FlattenAutomatonPass`] | compose a network into one automaton |
//! | `order_reduction` | [`OrderReductionPass`] | cone-of-influence variable reduction |
//! | `identity_resets` | [`AddIdentityResetPass`] | make every reset explicit |
//! | `split_disjunctions` | [`SplitDisjunctionGuardsPass`] | one transition per guard disjunct |
//! | `continuize` | [`ContinuizationPass`] | event-triggered continuization |
//! | `continuize_tt` | [`TimeTriggeredContinuizationPass`] | time-triggered continuization |
//! | `time_scale` | [`TimeScalePass`] | multiply every flow by a constant |
//! | `shorten_mode_names` | [`ShortenModeNamesPass`] | truncate long mode names |
//! | `remove_unsat_invariants` | [`RemoveSimpleUnsatInvariantsPass`] | drop modes with contradictory invariants |
//!
//! Passes are stateless, so one instance serves any number of runs. Parameter strings are split
//! on whitespace and parsed with `clap`, so `--help` style diagnostics name the offending token.
//!
//! Use [`run_pass`] or a [`Pipeline`] rather than [`Pass::run`] directly: they run the pass on a
//! scratch copy and commit it only when the pass and the validation gate both succeed.
//!
//! ```
//! use hybrid_rs::context::Context;
//! use hybrid_rs::generate::debug_configuration;
//! use hybrid_rs::passes::{Pipeline, Registry};
//!
//! let mut config = debug_configuration(&[["x", "-k * x", "1"]]).unwrap();
//! config.root_base_mut().unwrap().add_constant("k", hybrid_rs::interval::Interval::point(2.0));
//!
//! let registry = Registry::new();
//! let mut pipeline = Pipeline::new();
//! pipeline.push(&registry, "sub_constants", "").unwrap();
//! pipeline.push(&registry, "simplify", "").unwrap();
//! pipeline.run(&mut config, &Context::default()).unwrap();
//!
//! let on = config.root_base().unwrap().mode("on").unwrap();
//! assert_eq!(on.flow_of("x").unwrap().to_string(), "-2 * x");
//! ```

mod continuization;
mod continuization_tt;
mod flatten;
mod identity_resets;
mod order_reduction;
mod remove_unsat_invariants;
mod shorten_mode_names;
mod simplify;
mod split_disjunctions;
mod sub_constants;
mod time_scale;

pub use continuization::ContinuizationPass;
pub use continuization_tt::TimeTriggeredContinuizationPass;
pub use flatten::{flatten, FlattenAutomatonPass};
pub use identity_resets::AddIdentityResetPass;
pub use order_reduction::OrderReductionPass;
pub use remove_unsat_invariants::RemoveSimpleUnsatInvariantsPass;
pub use shorten_mode_names::ShortenModeNamesPass;
pub use simplify::SimplifyExpressionsPass;
pub use split_disjunctions::SplitDisjunctionGuardsPass;
pub use sub_constants::SubstituteConstantsPass;
pub use time_scale::TimeScalePass;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info, trace};

use crate::config::Configuration;
use crate::context::Context;
use crate::error::{Error, Result};

pub trait Pass: Send + Sync {
    /// Stable identifier used to request the pass.
    fn command_line_flag(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// Usage of the parameter string.
    fn param_help(&self) -> String;

    /// Rewrites `config` in place.
    ///
    /// May leave `config` half-transformed on error; see [`run_pass`] for the atomic variant.
    fn run(&self, config: &mut Configuration, params: &str, ctx: &Context) -> Result<()>;
}

/// Parses a whitespace-separated parameter string into the clap struct `P`.
///
/// `P` must be declared with `#[command(no_binary_name = true)]`.
pub(crate) fn parse_params<P: clap::Parser>(pass: &str, params: &str) -> Result<P> {
    P::try_parse_from(params.split_whitespace()).map_err(|e| {
        let text = e.to_string();
        let message: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("tip:"))
            .take_while(|line| !line.starts_with("Usage:") && !line.starts_with("For more information"))
            .collect();
        Error::params(pass, message.join(" ").trim_start_matches("error: "))
    })
}

/// Renders the usage of the clap struct `P`.
pub(crate) fn render_help<P: clap::CommandFactory>() -> String {
    P::command().render_help().to_string()
}

/// Runs one pass atomically: on a scratch copy, then through the validation gate.
pub fn run_pass(pass: &dyn Pass, config: &mut Configuration, params: &str, ctx: &Context) -> Result<()> {
    info!("Running pass {} with params '{}'", pass.name(), params);
    let mut scratch = config.clone();
    pass.run(&mut scratch, params, ctx)?;
    ctx.validate(&scratch)?;
    *config = scratch;
    trace!("Configuration after {}:\n{}", pass.name(), ctx.render_configuration(config));
    Ok(())
}

/// Closed set of passes keyed by flag.
pub struct Registry {
    passes: IndexMap<&'static str, Arc<dyn Pass>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.passes.keys()).finish()
    }
}

impl Registry {
    /// Registry with every built-in pass.
    pub fn new() -> Self {
        let builtin: Vec<Arc<dyn Pass>> = vec![
            Arc::new(SubstituteConstantsPass),
            Arc::new(SimplifyExpressionsPass),
            Arc::new(FlattenAutomatonPass),
            Arc::new(OrderReductionPass),
            Arc::new(AddIdentityResetPass),
            Arc::new(SplitDisjunctionGuardsPass),
            Arc::new(ContinuizationPass),
            Arc::new(TimeTriggeredContinuizationPass),
            Arc::new(TimeScalePass),
            Arc::new(ShortenModeNamesPass),
            Arc::new(RemoveSimpleUnsatInvariantsPass),
        ];
        let mut registry = Self::empty();
        for pass in builtin {
            let flag = pass.command_line_flag();
            let previous = registry.passes.insert(flag, pass);
            debug_assert!(previous.is_none(), "built-in flag '{}' registered twice", flag);
        }
        registry
    }

    pub fn empty() -> Self {
        Self { passes: IndexMap::new() }
    }

    /// Adds a pass, rejecting a flag that is already taken.
    pub fn register(&mut self, pass: Arc<dyn Pass>) -> Result<()> {
        let flag = pass.command_line_flag();
        if let Some(existing) = self.passes.get(flag) {
            return Err(Error::params(
                flag,
                format!("flag is already registered by '{}'", existing.name()),
            ));
        }
        self.passes.insert(flag, pass);
        Ok(())
    }

    pub fn get(&self, flag: &str) -> Result<Arc<dyn Pass>> {
        self.passes
            .get(flag)
            .cloned()
            .ok_or_else(|| Error::UnknownPass(flag.to_string()))
    }

    pub fn flags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Pass> {
        self.passes.values().map(|p| p.as_ref())
    }
}

/// An ordered list of passes resolved against a [`Registry`].
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<(Arc<dyn Pass>, String)>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|(p, params)| (p.command_line_flag(), params)))
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step; unknown flags are rejected here, before anything runs.
    pub fn push(&mut self, registry: &Registry, flag: &str, params: impl Into<String>) -> Result<()> {
        let pass = registry.get(flag)?;
        self.steps.push((pass, params.into()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order, stopping at the first failure.
    ///
    /// Steps that completed stay applied; the failing step leaves `config` as it found it.
    pub fn run(&self, config: &mut Configuration, ctx: &Context) -> Result<()> {
        for (i, (pass, params)) in self.steps.iter().enumerate() {
            debug!("Pipeline step {}/{}: {}", i + 1, self.steps.len(), pass.command_line_flag());
            run_pass(pass.as_ref(), config, params, ctx)?;
        }
        Ok(())
    }
}
