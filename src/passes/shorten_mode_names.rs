use clap::Parser;
use indexmap::{IndexMap, IndexSet};
use log::{debug, info};

use crate::config::Configuration;
use crate::context::Context;
use crate::error::{Error, Result};

use super::{parse_params, render_help, Pass};

const FLAG: &str = "shorten_mode_names";

#[derive(Debug, Parser)]
#[command(name = FLAG, no_binary_name = true)]
struct Params {
    /// Longest mode name kept as is.
    #[arg(long, value_name = "INT", default_value_t = 16)]
    max_len: usize,
}

/// Truncates long mode names of a flat automaton, keeping them unique.
///
/// A truncated name that collides with another mode loses a few more characters and gets a
/// `_2`, `_3`, ... suffix. Transitions and the `init`/`forbidden` maps follow the renaming.
pub struct ShortenModeNamesPass;

impl Pass for ShortenModeNamesPass {
    fn command_line_flag(&self) -> &'static str {
        FLAG
    }

    fn name(&self) -> &'static str {
        "Shorten Mode Names"
    }

    fn param_help(&self) -> String {
        render_help::<Params>()
    }

    fn run(&self, config: &mut Configuration, params: &str, _ctx: &Context) -> Result<()> {
        let max_len = parse_params::<Params>(FLAG, params)?.max_len;
        if max_len < 4 {
            return Err(Error::params(FLAG, format!("max length must be at least 4, got {}", max_len)));
        }

        let base = config.root_base_mut()?;
        let renames = shortened_names(base.modes.keys(), max_len);
        if renames.is_empty() {
            return Ok(());
        }
        for (old, new) in &renames {
            debug!("Renaming mode '{}' to '{}'", old, new);
        }

        let rename = |name: &String| renames.get(name).cloned().unwrap_or_else(|| name.clone());
        base.modes = std::mem::take(&mut base.modes)
            .into_iter()
            .map(|(name, mut mode)| {
                mode.name = rename(&name);
                (mode.name.clone(), mode)
            })
            .collect();
        for t in &mut base.transitions {
            t.from = rename(&t.from);
            t.to = rename(&t.to);
        }
        for regions in [&mut config.init, &mut config.forbidden] {
            *regions = std::mem::take(regions)
                .into_iter()
                .map(|(mode, region)| (rename(&mode), region))
                .collect();
        }

        info!("Shortened {} mode name(s)", renames.len());
        Ok(())
    }
}

/// New names for every mode longer than `max_len` characters.
fn shortened_names<'a>(names: impl Iterator<Item = &'a String>, max_len: usize) -> IndexMap<String, String> {
    let names: Vec<&String> = names.collect();
    let mut taken: IndexSet<String> = names
        .iter()
        .filter(|name| name.chars().count() <= max_len)
        .map(|name| name.to_string())
        .collect();
    let mut renames = IndexMap::new();

    for name in names.into_iter().filter(|name| name.chars().count() > max_len) {
        let mut short: String = name.chars().take(max_len).collect();
        let mut index = 2;
        while taken.contains(&short) {
            let suffix = format!("_{}", index);
            let prefix: String = name.chars().take(max_len.saturating_sub(suffix.len())).collect();
            short = format!("{}{}", prefix, suffix);
            index += 1;
        }
        taken.insert(short.clone());
        renames.insert(name.clone(), short);
    }
    renames
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::automaton::{AutomatonMode, AutomatonTransition};
    use crate::error::ErrorKind;
    use crate::expr::Expr;
    use crate::generate::debug_configuration;

    #[test]
    fn test_collisions_get_suffix() {
        let names: Vec<String> = ["loc_heating_phase_1", "loc_heating_phase_2", "loc_heating", "off"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let renames = shortened_names(names.iter(), 11);
        assert_eq!(renames.len(), 2);
        assert_eq!(renames["loc_heating_phase_1"], "loc_heati_2");
        assert_eq!(renames["loc_heating_phase_2"], "loc_heati_3");
    }

    #[test]
    fn test_references_renamed() {
        let mut config = debug_configuration(&[["x", "1", "0"]]).unwrap();
        {
            let base = config.root_base_mut().unwrap();
            base.add_mode(AutomatonMode::new("cooling_down_slowly"));
            base.add_transition(AutomatonTransition::new("on", "cooling_down_slowly"));
            base.add_transition(AutomatonTransition::new("cooling_down_slowly", "on"));
        }
        config.forbidden.insert("cooling_down_slowly".into(), Expr::TRUE);

        ShortenModeNamesPass
            .run(&mut config, "--max-len 8", &Context::default())
            .unwrap();
        assert!(config.validate().is_ok());

        let base = config.root_base().unwrap();
        assert_eq!(base.modes.keys().collect::<Vec<_>>(), vec!["on", "cooling_"]);
        assert_eq!(base.mode("cooling_").unwrap().name, "cooling_");
        assert_eq!(base.transitions[0].to, "cooling_");
        assert_eq!(base.transitions[1].from, "cooling_");
        assert!(config.forbidden.contains_key("cooling_"));
        assert!(config.init.contains_key("on"));
    }

    #[test]
    fn test_max_len_checked() {
        let mut config = debug_configuration(&[["x", "1", "0"]]).unwrap();
        let err = ShortenModeNamesPass
            .run(&mut config, "--max-len 2", &Context::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Params);
    }
}
