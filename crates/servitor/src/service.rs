//! The contract an embedding application implements to be controlled.

use std::fmt;
use std::io::{self, Write};

use servitor_config::{ServiceEndpoint, VerbSet};

/// Status reported when a service does not override [`Service::status`].
pub const DEFAULT_STATUS: &str = "STATUS: the service is running";

/// A long-running workload driven by the service controller.
///
/// `start` runs on the thread that invoked the `run` verb. Every other
/// method that reacts to a control request runs on the listener thread, so
/// implementations share state through atomics or locks.
pub trait Service: Send + Sync + 'static {
    /// Runs the workload. Returns only once the work is finished or a
    /// [`Service::stop`] request has been observed.
    fn start(&self, args: &[String]);

    /// Asks a concurrently running [`Service::start`] to return.
    ///
    /// Must return promptly and must leave a persistent flag behind: the
    /// request may arrive before `start` has been entered.
    fn stop(&self, args: &[String]);

    /// Describes the current state of the workload.
    fn status(&self, _args: &[String]) -> String {
        DEFAULT_STATUS.to_owned()
    }

    /// Usage text printed for a bare or unrecognised invocation.
    fn usage(&self, context: &HookContext<'_>) -> String {
        context.verbs.usage(context.program)
    }

    /// Called when a client verb finds nothing listening on the endpoint.
    fn on_not_running(
        &self,
        _context: &HookContext<'_>,
        output: &mut ControlOutput<'_>,
    ) -> io::Result<()> {
        output.stderr_line(format_args!("The service is not running"))
    }

    /// Called when `start` or `run` finds the control endpoint occupied.
    fn on_already_running(
        &self,
        context: &HookContext<'_>,
        output: &mut ControlOutput<'_>,
    ) -> io::Result<()> {
        output.stderr_line(format_args!(
            "The service is already running, or another process is using the port {}.",
            context.endpoint.port
        ))
    }

    /// Called after a `start` probe was answered. Does nothing by default.
    fn on_started(
        &self,
        _context: &HookContext<'_>,
        _output: &mut ControlOutput<'_>,
    ) -> io::Result<()> {
        Ok(())
    }

    /// Called after a stop request was acknowledged. Does nothing by default.
    fn on_stopped(
        &self,
        _context: &HookContext<'_>,
        _output: &mut ControlOutput<'_>,
    ) -> io::Result<()> {
        Ok(())
    }

    /// Called with a verb the controller does not know.
    fn on_command_not_handled(
        &self,
        _command: &str,
        _args: &[String],
        context: &HookContext<'_>,
        output: &mut ControlOutput<'_>,
    ) -> io::Result<()> {
        output.stdout_line(format_args!("{}", self.usage(context)))
    }
}

/// Facts about the controller that hooks may want to report.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Program name used in usage text.
    pub program: &'a str,
    /// Verb spellings in effect.
    pub verbs: &'a VerbSet,
    /// Control endpoint in effect.
    pub endpoint: &'a ServiceEndpoint,
}

/// Output handle abstracting over the stdout/stderr writers.
pub struct ControlOutput<'a> {
    stdout: &'a mut dyn Write,
    stderr: &'a mut dyn Write,
}

impl<'a> ControlOutput<'a> {
    /// Wraps the writers used for user-facing messages.
    pub fn new(stdout: &'a mut dyn Write, stderr: &'a mut dyn Write) -> Self {
        Self { stdout, stderr }
    }

    /// Writes one line to stdout and flushes.
    pub fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.stdout.write_fmt(args)?;
        self.stdout.write_all(b"\n")?;
        self.stdout.flush()
    }

    /// Writes one line to stderr and flushes.
    pub fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.stderr.write_fmt(args)?;
        self.stderr.write_all(b"\n")?;
        self.stderr.flush()
    }
}
