//! Configuration loading for controller invocations.
//!
//! Configuration flags lead the command line. Everything from the first
//! token that is not a recognised flag onwards is the verb and its
//! arguments. The leading flags are also what the controller forwards to
//! the `run` process it spawns.

use std::ffi::{OsStr, OsString};
use std::sync::Arc;

use ortho_config::OrthoConfig;
use servitor_config::{CONFIG_CLI_FLAGS, Config};

use crate::control::ControlError;

/// Loads [`Config`] from the configuration portion of the command line.
pub trait ConfigLoader {
    /// Loads configuration. `args` starts with the program name.
    fn load(&self, args: &[OsString]) -> Result<Config, ControlError>;
}

/// Loader layering defaults, files, environment, and flags via `ortho_config`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, ControlError> {
        Config::load_from_iter(args.iter().cloned()).map_err(ControlError::Config)
    }
}

/// Loader that ignores the command line and returns a fixed configuration.
#[derive(Debug, Clone)]
pub struct FixedConfigLoader {
    config: Arc<Config>,
}

impl FixedConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl ConfigLoader for FixedConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, ControlError> {
        Ok(Config::clone(&self.config))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn classify_flag(argument: &OsStr) -> FlagAction {
    let Some(text) = argument.to_str() else {
        return FlagAction::Skip;
    };
    if !text.starts_with("--") {
        return FlagAction::Skip;
    }
    let (flag, has_inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text, false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !has_inline_value,
        }
    } else {
        FlagAction::Skip
    }
}

/// Result of separating configuration flags from the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by the configuration flags.
    pub(crate) config_arguments: Vec<OsString>,
    /// Index of the verb in the original arguments.
    pub(crate) command_start: usize,
}

impl ConfigArgumentSplit {
    /// Configuration flags without the program name.
    pub(crate) fn forwarded_flags(&self) -> Vec<OsString> {
        self.config_arguments.iter().skip(1).cloned().collect()
    }

    /// The verb and its arguments.
    pub(crate) fn command<'a>(&self, args: &'a [OsString]) -> &'a [OsString] {
        args.get(self.command_start..).unwrap_or_default()
    }
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut filtered = vec![program.clone()];
    let mut index = 1usize;
    while let Some(argument) = args.get(index) {
        match classify_flag(argument) {
            FlagAction::Include { needs_value } => {
                filtered.push(argument.clone());
                index += 1;
                if needs_value {
                    if let Some(value) = args.get(index) {
                        filtered.push(value.clone());
                        index += 1;
                    }
                }
            }
            FlagAction::Skip => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments: filtered,
        command_start: index,
    }
}
