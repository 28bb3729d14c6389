//! Spawning detached `run` processes.
//!
//! The launcher re-executes the current program (or an explicit override)
//! with the configuration flags the caller was given, the `run` verb, and
//! the forwarded service arguments. It does not wait for the child: binding
//! the control socket happens asynchronously, so callers sleep for the
//! configured settle delay before probing.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

const LAUNCHER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::launcher");

/// Errors raised while spawning a service process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The path of the running executable could not be determined.
    #[error("failed to resolve the current executable: {source}")]
    CurrentExe {
        #[source]
        source: io::Error,
    },
    /// The operating system refused to create the process.
    #[error("failed to spawn service process '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything needed to start a service process except its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    program: PathBuf,
    leading_args: Vec<OsString>,
    run_verb: String,
}

impl LaunchSpec {
    /// Builds a spec for `program`.
    ///
    /// `leading_args` are passed before the verb; the controller uses them
    /// to forward configuration flags.
    #[must_use]
    pub fn new(program: PathBuf, leading_args: Vec<OsString>, run_verb: impl Into<String>) -> Self {
        Self {
            program,
            leading_args,
            run_verb: run_verb.into(),
        }
    }

    /// Builds a spec that re-executes the running program.
    pub fn current(
        leading_args: Vec<OsString>,
        run_verb: impl Into<String>,
    ) -> Result<Self, LaunchError> {
        let program = env::current_exe().map_err(|source| LaunchError::CurrentExe { source })?;
        Ok(Self::new(program, leading_args, run_verb))
    }

    /// Executable to run.
    #[must_use]
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Spelling of the `run` verb.
    #[must_use]
    pub fn run_verb(&self) -> &str {
        &self.run_verb
    }

    /// Full argument vector for the child, excluding the program itself.
    #[must_use]
    pub fn command_line(&self, args: &[String]) -> Vec<OsString> {
        self.leading_args
            .iter()
            .cloned()
            .chain(std::iter::once(OsString::from(&self.run_verb)))
            .chain(args.iter().map(OsString::from))
            .collect()
    }
}

/// Starts service processes without waiting for them.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessLauncher: Send + Sync {
    /// Spawns `spec` with the forwarded `args`.
    fn spawn(&self, spec: &LaunchSpec, args: &[String]) -> Result<(), LaunchError>;
}

/// Launcher backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn spawn(&self, spec: &LaunchSpec, args: &[String]) -> Result<(), LaunchError> {
        let mut command = Command::new(spec.program());
        command
            .args(spec.command_line(args))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut command);
        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: spec.program().clone(),
            source,
        })?;
        debug!(
            target: LAUNCHER_TARGET,
            pid = child.id(),
            program = %spec.program().display(),
            "service process spawned"
        );
        Ok(())
    }
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // A fresh process group keeps terminal job-control signals away from
    // the service once the launching shell exits.
    command.process_group(0);
}

#[cfg(not(unix))]
fn detach(_command: &mut Command) {}
