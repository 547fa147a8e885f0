use clap::Parser;
use log::info;

use crate::config::Configuration;
use crate::context::Context;
use crate::continuize::{continuize, ContinuizationParams, RangeTarget};
use crate::error::Result;

use super::{parse_params, render_help, Pass};

const FLAG: &str = "continuize";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true, allow_negative_numbers = true)]
struct Params {
    /// Variable to continuize.
    #[arg(long = "var", value_name = "VAR")]
    variable: String,

    /// Clock tracking global time (found or introduced if omitted).
    #[arg(long = "timevar", value_name = "VAR")]
    time_variable: Option<String>,

    /// Sampling period of the controller.
    #[arg(long, value_name = "FLOAT")]
    period: f64,

    /// Also simulate from the corners of the initial box.
    #[arg(long)]
    blowup: bool,

    /// Upper bounds of the time windows, strictly increasing.
    #[arg(long, value_name = "FLOAT", num_args = 1.., required = true)]
    times: Vec<f64>,

    /// Bloat amount for each time window.
    #[arg(long, value_name = "FLOAT", num_args = 1.., required = true)]
    bloats: Vec<f64>,
}

/// Event-triggered continuization, see [`continuize`].
pub struct ContinuizationPass;

impl Pass for ContinuizationPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Continuization"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, ctx: &Context) -> Result<()> {
        let params = parse_params::<Params>(FLAG, params)?;
        let params = ContinuizationParams {
            variable: params.variable,
            time_variable: params.time_variable,
            period: params.period,
            blowup: params.blowup,
            breakpoints: params.times,
            bloats: params.bloats,
            target: RangeTarget::Derivative,
        };
        for range in continuize(config, &params, ctx, FLAG)? {
            info!(
                "{}' in '{}' over {}: estimated {}, bloated {}",
                params.variable, range.window_mode, range.window, range.raw, range.bloated
            );
        }
        Ok(())
    }
}
