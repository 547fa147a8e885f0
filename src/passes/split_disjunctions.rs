use clap::Parser;
use log::debug;

use crate::automaton::AutomatonTransition;
use crate::config::Configuration;
use crate::context::Context;
use crate::error::Result;

use super::{parse_params, render_help, Pass};

const FLAG: &str = "split_disjunctions";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true)]
struct Params {}

/// Replaces a transition guarded by `a || b` with one transition per disjunct.
pub struct SplitDisjunctionGuardsPass;

impl Pass for SplitDisjunctionGuardsPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Split Disjunction Guards"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, _ctx: &Context) -> Result<()> {
        parse_params::<Params>(FLAG, params)?;
        let base = config.root_base_mut()?;
        let mut split = Vec::with_capacity(base.transitions.len());
        for t in base.transitions.drain(..) {
            let disjuncts = t.guard.disjuncts();
            if disjuncts.len() < 2 {
                split.push(t);
                continue;
            }
            debug!("Splitting {} into {} transitions", t.describe(), disjuncts.len());
            split.extend(disjuncts.into_iter().map(|guard| AutomatonTransition {
                guard: guard.clone(),
                ..t.clone()
            }));
        }
        base.transitions = split;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::automaton::AutomatonMode;
    use crate::expr::Expr;
    use crate::generate::debug_configuration;
    use crate::parser::parse_guard;

    #[test]
    fn test_split() {
        let mut config = debug_configuration(&[["x", "1", "0"]]).unwrap();
        let base = config.root_base_mut().unwrap();
        base.add_mode(AutomatonMode::new("off"));
        base.add_transition(
            AutomatonTransition::new("on", "off")
                .with_guard(parse_guard("x >= 2 || x <= -2 || (x == 0 && x != 1)").unwrap())
                .with_reset("x", Expr::num(0.0)),
        );
        base.add_transition(AutomatonTransition::new("off", "on").with_guard(parse_guard("x >= 1").unwrap()));

        SplitDisjunctionGuardsPass.run(&mut config, "", &Context::default()).unwrap();
        let base = config.root_base().unwrap();
        let guards: Vec<String> = base.transitions.iter().map(|t| t.guard.to_string()).collect();
        assert_eq!(guards, vec!["x >= 2", "x <= -2", "x == 0 && x != 1", "x >= 1"]);
        assert!(base.transitions_from("on").all(|t| t.reset.contains_key("x")));
    }
}
