use clap::Parser;
use log::{debug, info};

use crate::config::Configuration;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::expr::Expr;

use super::{parse_params, render_help, Pass};

const FLAG: &str = "time_scale";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true, allow_negative_numbers = true)]
struct Params {
    /// Factor every flow is multiplied by.
    #[arg(long, value_name = "FLOAT")]
    multiplier: f64,
}

/// Speeds up (or slows down) every mode's dynamics by a constant factor.
///
/// Each flow `x' = e + I` becomes `x' = m * e + m * I`. The time horizon and the step hint are
/// divided by `m`, so the scaled model covers the same trajectories.
pub struct TimeScalePass;

impl Pass for TimeScalePass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Scale Time"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, _ctx: &Context) -> Result<()> {
        let m = parse_params::<Params>(FLAG, params)?.multiplier;
        if !(m.is_finite() && m > 0.0) {
            return Err(Error::params(FLAG, format!("multiplier must be positive, got '{}'", m)));
        }

        let mut scaled = 0;
        for base in config.root.base_components_mut() {
            for mode in base.modes.values_mut() {
                for (var, rhs) in mode.flow.iter_mut().flatten() {
                    rhs.expr = match rhs.expr.as_num() {
                        Some(c) => Expr::num(c * m),
                        None => Expr::num(m).mul(rhs.expr.clone()),
                    };
                    rhs.interval = rhs.interval.map(|i| i * m);
                    debug!("Mode '{}': {}' = {}", mode.name, var, rhs);
                    scaled += 1;
                }
            }
        }
        config.settings.time_horizon /= m;
        config.settings.step /= m;
        info!("Scaled {} flow(s) by {}", scaled, m);
        Ok(())
    }
}
