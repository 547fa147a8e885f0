use clap::Parser;

use crate::config::Configuration;
use crate::context::Context;
use crate::error::Result;

use super::{parse_params, render_help, Pass};

const FLAG: &str = "simplify";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true)]
struct Params {}

/// Simplifies every expression of the model, leaving its structure untouched.
pub struct SimplifyExpressionsPass;

impl Pass for SimplifyExpressionsPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Simplify Expressions"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, _ctx: &Context) -> Result<()> {
        parse_params::<Params>(FLAG, params)?;
        config.root.map_expressions(&mut |e| e.simplify());
        for region in config.init.values_mut().chain(config.forbidden.values_mut()) {
            *region = region.simplify();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::generate::debug_configuration;

    #[test]
    fn test_simplify_flows_and_regions() {
        let mut config = debug_configuration(&[["x", "0 + 1 * (2 * 3) * x", "1 + 1"], ["y", "x * 0", "0"]]).unwrap();
        SimplifyExpressionsPass.run(&mut config, "", &Context::default()).unwrap();
        let on = config.root_base().unwrap().mode("on").unwrap();
        assert_eq!(on.flow_of("x").unwrap().to_string(), "6 * x");
        assert_eq!(on.flow_of("y").unwrap().to_string(), "0");
        assert_eq!(config.init["on"].to_string(), "x == 2 && y == 0");
        assert_eq!(config.root_base().unwrap().variables.len(), 2);
    }
}
