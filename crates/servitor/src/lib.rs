//! Turn a long-running workload into a controllable background service.
//!
//! An embedding application implements [`Service`] and hands it to
//! [`run`] from its `main`. The resulting binary understands five verbs:
//!
//! - `run` binds a loopback control socket and blocks in
//!   [`Service::start`] until the service is told to stop;
//! - `start` spawns a detached `run` process and probes it;
//! - `stop`, `status`, and `restart` talk to a running instance over the
//!   control socket.
//!
//! Configuration flags (see [`servitor_config::Config`]) precede the verb
//! and are forwarded to spawned processes.

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

pub mod client;
mod config;
pub mod control;
pub mod frame;
pub mod launcher;
mod service;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod tests;

use config::split_config_arguments;
pub use config::{ConfigLoader, FixedConfigLoader, OrthoConfigLoader};
pub use control::{ControlError, ControllerOptions, START_PROBE, ServiceController};
pub use service::{ControlOutput, DEFAULT_STATUS, HookContext, Service};
pub use servitor_config::{Config, ServiceEndpoint, Verb, VerbSet};

const DEFAULT_PROGRAM: &str = "service";

/// Runs one controller invocation with layered configuration.
///
/// `args` is the full argument vector including the program name. Errors
/// are written to `stderr` and turned into a failure exit code.
#[must_use]
pub fn run<I, W, E>(
    service: Arc<dyn Service>,
    options: ControllerOptions,
    args: I,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(service, options, args, stdout, stderr, &OrthoConfigLoader)
}

/// Runs one controller invocation with a custom configuration loader.
#[must_use]
pub fn run_with_loader<I, W, E, L>(
    service: Arc<dyn Service>,
    options: ControllerOptions,
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader + ?Sized,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let mut output = ControlOutput::new(stdout, stderr);
    match invoke(service, options, &args, loader, &mut output) {
        Ok(exit_code) => exit_code,
        Err(error) => {
            let _ = output.stderr_line(format_args!("{error}"));
            ExitCode::FAILURE
        }
    }
}

fn invoke<L: ConfigLoader + ?Sized>(
    service: Arc<dyn Service>,
    options: ControllerOptions,
    args: &[OsString],
    loader: &L,
    output: &mut ControlOutput<'_>,
) -> Result<ExitCode, ControlError> {
    let split = split_config_arguments(args);
    let config = loader.load(&split.config_arguments)?;
    telemetry::initialise(&config)?;
    let command = split
        .command(args)
        .iter()
        .map(|argument| {
            argument
                .clone()
                .into_string()
                .map_err(|argument| ControlError::NonUtf8Argument { argument })
        })
        .collect::<Result<Vec<_>, _>>()?;

    ServiceController::new(service, config, options)
        .with_forwarded_flags(split.forwarded_flags())
        .with_default_program(&program_name(args))
        .execute(&command, output)
}

fn program_name(args: &[OsString]) -> String {
    args.first()
        .and_then(|argument| Path::new(argument).file_stem())
        .map_or_else(
            || DEFAULT_PROGRAM.to_owned(),
            |stem| stem.to_string_lossy().into_owned(),
        )
}
