use clap::Parser;
use log::info;

use crate::config::Configuration;
use crate::context::Context;
use crate::continuize::{continuize_time_triggered, TimeTriggeredParams};
use crate::error::Result;

use super::{parse_params, render_help, Pass};

const FLAG: &str = "continuize_tt";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true, allow_negative_numbers = true)]
struct Params {
    /// Also simulate from the corners of the initial box.
    #[arg(long)]
    blowup: bool,

    /// Macro time step, a multiple of the sampling period.
    #[arg(long, value_name = "FLOAT")]
    step: f64,

    /// Bloat amount for every macro window.
    #[arg(long, value_name = "FLOAT")]
    bloat: f64,
}

/// Time-triggered continuization, see [`continuize_time_triggered`].
pub struct TimeTriggeredContinuizationPass;

impl Pass for TimeTriggeredContinuizationPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Time-Triggered Continuization"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, ctx: &Context) -> Result<()> {
        let params = parse_params::<Params>(FLAG, params)?;
        let params = TimeTriggeredParams {
            blowup: params.blowup,
            step: params.step,
            bloat: params.bloat,
        };
        for range in continuize_time_triggered(config, &params, ctx, FLAG)? {
            info!(
                "'{}' over {}: estimated {}, bloated {}",
                range.window_mode, range.window, range.raw, range.bloated
            );
        }
        Ok(())
    }
}
