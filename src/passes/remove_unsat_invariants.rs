use clap::Parser;
use indexmap::IndexMap;
use log::{debug, info};

use crate::config::Configuration;
use crate::context::Context;
use crate::error::Result;
use crate::expr::{BinaryOp, Expr};

use super::{parse_params, render_help, Pass};

const FLAG: &str = "remove_unsat_invariants";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true)]
struct Params {}

/// Removes modes whose invariant can never hold, along with every transition touching them.
///
/// Only simple contradictions are detected: a conjunct that simplifies to `false`, or constant
/// bounds on one variable that exclude each other (`x >= 5 && x < 2`, `x > 1 && x <= 1`).
pub struct RemoveSimpleUnsatInvariantsPass;

impl Pass for RemoveSimpleUnsatInvariantsPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Remove Simple Unsat Invariants"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, _ctx: &Context) -> Result<()> {
        parse_params::<Params>(FLAG, params)?;

        let mut removed = 0;
        for base in config.root.base_components_mut() {
            let unsat: Vec<String> = base
                .modes
                .values()
                .filter(|mode| is_trivially_unsat(&mode.invariant))
                .map(|mode| mode.name.clone())
                .collect();
            for name in &unsat {
                debug!("Removing mode '{}' with invariant '{}'", name, base.modes[name].invariant);
                base.modes.shift_remove(name);
            }
            base.transitions
                .retain(|t| !unsat.contains(&t.from) && !unsat.contains(&t.to));
            removed += unsat.len();
        }

        if removed > 0 {
            let names = config.mode_names();
            config.init.retain(|mode, _| names.contains(mode));
            config.forbidden.retain(|mode, _| names.contains(mode));
        }
        info!("Removed {} mode(s) with unsatisfiable invariants", removed);
        Ok(())
    }
}

/// One side of a constant bound: the value and whether it is strict.
type Bound = (f64, bool);

fn is_trivially_unsat(invariant: &Expr) -> bool {
    let invariant = invariant.simplify();
    let mut lower: IndexMap<&str, Bound> = IndexMap::new();
    let mut upper: IndexMap<&str, Bound> = IndexMap::new();

    for conjunct in invariant.conjuncts() {
        if *conjunct == Expr::FALSE {
            return true;
        }
        let Expr::Binary(op, lhs, rhs) = conjunct else {
            continue;
        };
        let (var, op, value) = match (lhs.as_var(), rhs.as_num(), lhs.as_num(), rhs.as_var()) {
            (Some(var), Some(value), _, _) => (var, *op, value),
            (_, _, Some(value), Some(var)) if op.is_comparison() => (var, op.mirror(), value),
            _ => continue,
        };
        match op {
            BinaryOp::Eq => {
                tighten_lower(&mut lower, var, (value, false));
                tighten_upper(&mut upper, var, (value, false));
            }
            BinaryOp::Ge => tighten_lower(&mut lower, var, (value, false)),
            BinaryOp::Gt => tighten_lower(&mut lower, var, (value, true)),
            BinaryOp::Le => tighten_upper(&mut upper, var, (value, false)),
            BinaryOp::Lt => tighten_upper(&mut upper, var, (value, true)),
            _ => {}
        }
    }

    lower.iter().any(|(var, &(lo, lo_strict))| match upper.get(var) {
        Some(&(hi, hi_strict)) => lo > hi || (lo == hi && (lo_strict || hi_strict)),
        None => false,
    })
}

fn tighten_lower<'a>(bounds: &mut IndexMap<&'a str, Bound>, var: &'a str, bound: Bound) {
    let entry = bounds.entry(var).or_insert(bound);
    if bound.0 > entry.0 || (bound.0 == entry.0 && bound.1) {
        *entry = bound;
    }
}

fn tighten_upper<'a>(bounds: &mut IndexMap<&'a str, Bound>, var: &'a str, bound: Bound) {
    let entry = bounds.entry(var).or_insert(bound);
    if bound.0 < entry.0 || (bound.0 == entry.0 && bound.1) {
        *entry = bound;
    }
}
