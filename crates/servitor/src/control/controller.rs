//! Verb routing and the client side of the lifecycle verbs.

use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use servitor_config::{Config, ServiceEndpoint, Verb};
use tracing::debug;

use super::{CONTROL_TARGET, ControlError, ControllerOptions};
use crate::client;
use crate::frame::{CommandFrame, ResponseFrame};
use crate::launcher::LaunchSpec;
use crate::service::{ControlOutput, HookContext, Service};

/// Command sent by `start` to confirm the spawned process answers.
pub const START_PROBE: &str = "Service is running";

const DEFAULT_PROGRAM: &str = "service";
const ENDPOINT_FLAGS: [&str; 2] = ["--control-host", "--control-port"];

/// Outcome of sending one request to the control endpoint.
#[derive(Debug)]
enum Delivery {
    Answered(ResponseFrame),
    NotRunning,
}

/// Drives a [`Service`] through the lifecycle verbs.
pub struct ServiceController {
    pub(super) service: Arc<dyn Service>,
    pub(super) config: Config,
    pub(super) options: ControllerOptions,
    pub(super) endpoint: ServiceEndpoint,
    program: String,
    forwarded_flags: Vec<OsString>,
}

impl ServiceController {
    /// Builds a controller for `service`.
    ///
    /// The endpoint comes from [`ControllerOptions::with_endpoint`] when set
    /// and from `config` otherwise.
    #[must_use]
    pub fn new(service: Arc<dyn Service>, config: Config, options: ControllerOptions) -> Self {
        let endpoint = options
            .endpoint
            .clone()
            .unwrap_or_else(|| config.endpoint());
        let program = options
            .program
            .clone()
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_owned());
        Self {
            service,
            config,
            options,
            endpoint,
            program,
            forwarded_flags: Vec::new(),
        }
    }

    /// Configuration flags to pass to spawned `run` processes.
    #[must_use]
    pub fn with_forwarded_flags(mut self, flags: Vec<OsString>) -> Self {
        self.forwarded_flags = flags;
        self
    }

    /// Program name used in usage text, unless the options already set one.
    #[must_use]
    pub(crate) fn with_default_program(mut self, program: &str) -> Self {
        if self.options.program.is_none() {
            program.clone_into(&mut self.program);
        }
        self
    }

    /// Options this controller was built with.
    #[must_use]
    pub const fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Control endpoint in effect.
    #[must_use]
    pub const fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    pub(super) fn context(&self) -> HookContext<'_> {
        HookContext {
            program: &self.program,
            verbs: &self.options.verbs,
            endpoint: &self.endpoint,
        }
    }

    /// Executes one invocation. `command` holds the verb and its arguments.
    pub fn execute(
        &self,
        command: &[String],
        output: &mut ControlOutput<'_>,
    ) -> Result<ExitCode, ControlError> {
        let Some((verb, args)) = command.split_first() else {
            output.stdout_line(format_args!("{}", self.service.usage(&self.context())))?;
            return Ok(ExitCode::SUCCESS);
        };
        debug!(target: CONTROL_TARGET, verb = verb.as_str(), args = args.len(), "dispatching verb");
        match self.options.verbs.classify(verb) {
            Some(Verb::Start) => self.start(args, output),
            Some(Verb::Run) => self.run(args, output),
            Some(Verb::Stop) => self.stop(args, output).map(|_| ExitCode::SUCCESS),
            Some(Verb::Restart) => self.restart(args, output),
            Some(Verb::Status) => self.status(args, output),
            None => {
                self.service
                    .on_command_not_handled(verb, args, &self.context(), output)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    fn start(
        &self,
        args: &[String],
        output: &mut ControlOutput<'_>,
    ) -> Result<ExitCode, ControlError> {
        let probe = CommandFrame::new(START_PROBE, args.to_vec())?;
        if client::is_reachable(&self.endpoint, self.options.connect_timeout)? {
            self.service.on_already_running(&self.context(), output)?;
            return Ok(ExitCode::FAILURE);
        }

        let spec = self.launch_spec()?;
        self.options.launcher.spawn(&spec, args)?;
        debug!(
            target: CONTROL_TARGET,
            endpoint = %self.endpoint,
            settle_ms = self.config.settle_delay().as_millis(),
            "service process launched; waiting before probing"
        );
        thread::sleep(self.config.settle_delay());

        match self.deliver(&probe)? {
            Delivery::Answered(response) => {
                print_response(&response, output)?;
                self.service.on_started(&self.context(), output)?;
                Ok(ExitCode::SUCCESS)
            }
            Delivery::NotRunning => {
                self.service.on_not_running(&self.context(), output)?;
                Ok(ExitCode::FAILURE)
            }
        }
    }

    /// Sends the stop verb. Returns whether a running service acknowledged it.
    fn stop(&self, args: &[String], output: &mut ControlOutput<'_>) -> Result<bool, ControlError> {
        let frame = self.frame_for(Verb::Stop, args)?;
        match self.deliver(&frame)? {
            Delivery::Answered(response) => {
                print_response(&response, output)?;
                self.service.on_stopped(&self.context(), output)?;
                Ok(true)
            }
            Delivery::NotRunning => {
                self.service.on_not_running(&self.context(), output)?;
                Ok(false)
            }
        }
    }

    fn restart(
        &self,
        args: &[String],
        output: &mut ControlOutput<'_>,
    ) -> Result<ExitCode, ControlError> {
        let stopped = self.stop(args, output)?;
        debug!(target: CONTROL_TARGET, stopped, "restart: stop phase finished");
        thread::sleep(self.config.settle_delay());
        self.start(args, output)
    }

    fn status(
        &self,
        args: &[String],
        output: &mut ControlOutput<'_>,
    ) -> Result<ExitCode, ControlError> {
        let frame = self.frame_for(Verb::Status, args)?;
        match self.deliver(&frame)? {
            Delivery::Answered(response) => print_response(&response, output)?,
            Delivery::NotRunning => self.service.on_not_running(&self.context(), output)?,
        }
        Ok(ExitCode::SUCCESS)
    }

    fn frame_for(&self, verb: Verb, args: &[String]) -> Result<CommandFrame, ControlError> {
        Ok(CommandFrame::new(
            self.options.verbs.spelling(verb),
            args.to_vec(),
        )?)
    }

    fn deliver(&self, frame: &CommandFrame) -> Result<Delivery, ControlError> {
        match client::exchange(&self.endpoint, frame, self.options.connect_timeout) {
            Ok(response) => Ok(Delivery::Answered(response)),
            Err(error) if error.is_not_running() => {
                debug!(target: CONTROL_TARGET, error = %error, "service not reachable");
                Ok(Delivery::NotRunning)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn launch_spec(&self) -> Result<LaunchSpec, ControlError> {
        let leading_args = self.child_flags();
        let run_verb = self.options.verbs.spelling(Verb::Run);
        let spec = match &self.options.executable {
            Some(executable) => LaunchSpec::new(executable.clone(), leading_args, run_verb),
            None => LaunchSpec::current(leading_args, run_verb)?,
        };
        Ok(spec)
    }

    /// Forwarded flags with the endpoint pinned to the one in effect, so the
    /// child binds exactly where the probe will look.
    fn child_flags(&self) -> Vec<OsString> {
        let mut flags = strip_endpoint_flags(&self.forwarded_flags);
        flags.extend([
            OsString::from(ENDPOINT_FLAGS[0]),
            OsString::from(&self.endpoint.host),
            OsString::from(ENDPOINT_FLAGS[1]),
            OsString::from(self.endpoint.port.to_string()),
        ]);
        flags
    }
}

fn print_response(response: &ResponseFrame, output: &mut ControlOutput<'_>) -> std::io::Result<()> {
    for line in response.lines() {
        output.stdout_line(format_args!("{line}"))?;
    }
    Ok(())
}

fn strip_endpoint_flags(flags: &[OsString]) -> Vec<OsString> {
    let mut kept = Vec::with_capacity(flags.len());
    let mut iter = flags.iter();
    while let Some(flag) = iter.next() {
        let text = flag.to_string_lossy();
        let (name, inline) = match text.split_once('=') {
            Some((name, _)) => (name, true),
            None => (text.as_ref(), false),
        };
        if ENDPOINT_FLAGS.contains(&name) {
            if !inline {
                iter.next();
            }
            continue;
        }
        kept.push(flag.clone());
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(values: &[&str]) -> Vec<OsString> {
        values.iter().map(OsString::from).collect()
    }

    #[test]
    fn endpoint_flags_are_removed_in_both_forms() {
        let flags = os(&[
            "--control-port",
            "7001",
            "--log-format=compact",
            "--control-host=localhost",
            "--settle-delay-ms",
            "5",
        ]);
        assert_eq!(
            strip_endpoint_flags(&flags),
            os(&["--log-format=compact", "--settle-delay-ms", "5"])
        );
    }
}
