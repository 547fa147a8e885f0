use clap::Parser;

use crate::config::Configuration;
use crate::context::Context;
use crate::error::Result;
use crate::expr::Expr;

use super::{parse_params, render_help, Pass};

const FLAG: &str = "identity_resets";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true)]
struct Params {}

/// Makes every reset explicit: variables a transition does not assign get `x := x`.
pub struct AddIdentityResetPass;

impl Pass for AddIdentityResetPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Add Identity Resets"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, _ctx: &Context) -> Result<()> {
        parse_params::<Params>(FLAG, params)?;
        let base = config.root_base_mut()?;
        for t in &mut base.transitions {
            for var in &base.variables {
                if !t.reset.contains_key(var) {
                    t.reset.insert(var.clone(), Expr::var(var.clone()).into());
                }
            }
        }
        Ok(())
    }
}
