//! Model generators.
//!
//! Importers are outside this crate, so models come from here: either written out row by row
//! ([`debug_configuration`]) or built from a few numbers ([`integrator_chain`]).

use clap::Parser;
use log::debug;

use crate::automaton::{AutomatonMode, BaseComponent};
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::parser::parse_expression;
use crate::passes::parse_params;

/// Generator names accepted by [`generate`].
pub const GENERATORS: [&str; 2] = ["debug", "chain"];

/// Builds a model by generator name, see [`GENERATORS`].
///
/// - `debug`: rows separated by `;`, each `var = flow` or `var = flow : init`, where `init` is a
///   value (meaning `var == value`, default `0`) or a condition.
/// - `chain`: `--order <N> [--horizon <FLOAT>]`.
pub fn generate(kind: &str, params: &str) -> Result<Configuration> {
    match kind {
        "debug" => debug_configuration(&parse_rows(params)?),
        "chain" => {
            let params = parse_params::<ChainParams>("chain", params)?;
            let mut config = integrator_chain(params.order)?;
            if let Some(horizon) = params.horizon {
                config.settings.time_horizon = horizon;
            }
            Ok(config)
        }
        _ => Err(Error::params(
            "generate",
            format!("unknown model generator '{}', expected one of {:?}", kind, GENERATORS),
        )),
    }
}

fn parse_rows(text: &str) -> Result<Vec<[String; 3]>> {
    text.split(';')
        .map(str::trim)
        .filter(|row| !row.is_empty())
        .map(|row| {
            let (var, rest) = row
                .split_once('=')
                .ok_or_else(|| Error::params("debug", format!("row '{}' is not 'var = flow [: init]'", row)))?;
            let (flow, init) = rest.split_once(':').unwrap_or((rest, "0"));
            Ok([var.trim().to_string(), flow.trim().to_string(), init.trim().to_string()])
        })
        .collect()
}

/// A single-mode automaton (`on`) from `[variable, flow, init]` rows.
///
/// `init` is either a condition, conjoined as is, or an expression `e`, contributing
/// `variable == e`. The conjunction of all rows is the initial region of `on`.
///
/// ```
/// use hybrid_rs::generate::debug_configuration;
///
/// let config = debug_configuration(&[["t", "1", "0"], ["y", "sin(t)", "0 <= y <= 1"]]).unwrap();
/// assert_eq!(config.init["on"].to_string(), "t == 0 && 0 <= y && y <= 1");
/// ```
pub fn debug_configuration<S: AsRef<str>>(rows: &[[S; 3]]) -> Result<Configuration> {
    let mut ha = BaseComponent::new();
    let mut on = AutomatonMode::new("on");
    let mut init = Vec::new();
    for [var, flow, start] in rows {
        let var = var.as_ref().trim();
        ha.add_variable(var);
        on.set_flow(var, parse_expression(flow.as_ref())?);
        let start = parse_expression(start.as_ref())?;
        if start.is_condition() {
            init.push(start);
        } else {
            init.push(Expr::var(var).equals(start));
        }
    }
    ha.add_mode(on);
    let mut config = Configuration::new(ha);
    config.init.insert("on".into(), Expr::and_all(init));
    Ok(config)
}

#[derive(Debug, Parser)]
#[command(name = "chain", no_binary_name = true)]
struct ChainParams {
    /// Number of chained integrators.
    #[arg(long, value_name = "INT")]
    order: usize,

    /// Time horizon of the generated model.
    #[arg(long, value_name = "FLOAT")]
    horizon: Option<f64>,
}

/// Chain of `order` integrators closed by the feedback `x_n' = -(x_1 + ... + x_n)`, plus a clock `t`.
///
/// Starts from `x_1 == 1`, everything else `0`.
pub fn integrator_chain(order: usize) -> Result<Configuration> {
    if order == 0 {
        return Err(Error::params("chain", "order must be at least 1"));
    }
    let names: Vec<String> = (1..=order).map(|i| format!("x{}", i)).collect();
    let mut rows = Vec::with_capacity(order + 1);
    for (i, name) in names.iter().enumerate() {
        let flow = match names.get(i + 1) {
            Some(next) => next.clone(),
            None => format!("-({})", names.join(" + ")),
        };
        let start = if i == 0 { "1" } else { "0" };
        rows.push([name.clone(), flow, start.to_string()]);
    }
    rows.push(["t".to_string(), "1".to_string(), "0".to_string()]);
    debug!("Generated integrator chain of order {}", order);
    let mut config = debug_configuration(&rows)?;
    config.settings.plot_variables = ["t".into(), "x1".into()];
    Ok(config)
}
