//! Command line parsing

use anyhow::{anyhow, bail, Context, Result};
use normlight_core::parse_level;
use std::path::PathBuf;
use std::time::Duration;

pub const USAGE: &str = "\
usage: normlight <config.ron|config.json> <target|room> <action> [--transition <ms>]

actions:
  on [level]     turn on; level is 0-100, NN% or a raw 101-255 value
  off            turn off
  step <delta>   change brightness by a signed raw delta";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    On(Option<u8>),
    Off,
    Step(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config: PathBuf,
    pub target: String,
    pub action: Action,
    pub transition: Option<Duration>,
}

impl Invocation {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut transition = None;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "--transition" {
                let ms = iter
                    .next()
                    .ok_or_else(|| anyhow!("--transition needs a value in milliseconds"))?;
                let ms: u64 = ms
                    .parse()
                    .with_context(|| format!("Invalid transition '{}'", ms))?;
                transition = Some(Duration::from_millis(ms));
            } else {
                positional.push(arg.as_str());
            }
        }

        let [config, target, action, rest @ ..] = positional.as_slice() else {
            bail!("missing arguments\n\n{}", USAGE);
        };

        let action = match (*action, rest) {
            ("on", []) => Action::On(None),
            ("on", [level]) => Action::On(Some(
                parse_level(level).ok_or_else(|| anyhow!("Invalid level '{}'", level))?,
            )),
            ("off", []) => Action::Off,
            ("step", [delta]) => Action::Step(
                delta
                    .parse()
                    .with_context(|| format!("Invalid step '{}'", delta))?,
            ),
            _ => bail!("unrecognized action\n\n{}", USAGE),
        };

        Ok(Self {
            config: PathBuf::from(config),
            target: target.to_string(),
            action,
            transition,
        })
    }
}
