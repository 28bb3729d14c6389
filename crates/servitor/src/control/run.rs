//! The `run` verb: host the service in the current process.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{info, warn};

use super::signals::SignalWatcher;
use super::{CONTROL_TARGET, ControlError, ServiceController};
use crate::service::ControlOutput;
use crate::transport::{
    CommandDispatcher, ControlListener, ListenerError, ListenerHandle, RuntimeState,
};

impl ServiceController {
    /// Binds the control socket, serves it on a background thread, and
    /// blocks in [`Service::start`](crate::Service::start).
    ///
    /// The execution lock is held for the whole call into `start`, so a stop
    /// acknowledgement can only be written once `start` has returned. The
    /// socket is closed inside the shutdown region, so it never disappears
    /// while a response is being written.
    pub(super) fn run(
        &self,
        args: &[String],
        output: &mut ControlOutput<'_>,
    ) -> Result<ExitCode, ControlError> {
        let listener = match ControlListener::bind(&self.endpoint) {
            Ok(listener) => listener,
            Err(error @ ListenerError::BindTcp { .. }) => {
                warn!(target: CONTROL_TARGET, error = %error, "control endpoint unavailable");
                self.service.on_already_running(&self.context(), output)?;
                output.stderr_line(format_args!("Could not listen on {}.", self.endpoint))?;
                return Ok(ExitCode::FAILURE);
            }
            Err(error) => return Err(error.into()),
        };

        let session = listener.into_session()?;
        session.set_state(RuntimeState::Starting);
        let execution = session.lock_execution();
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&self.service),
            self.options.verbs.clone(),
            Arc::clone(&session),
        );
        let handle = ListenerHandle::spawn(Arc::clone(&session), Arc::new(dispatcher))?;
        let signals = if self.config.handles_signals() {
            Some(SignalWatcher::install(
                Arc::clone(&self.service),
                Arc::clone(&session),
            )?)
        } else {
            None
        };

        info!(target: CONTROL_TARGET, endpoint = %self.endpoint, "service listening");
        if session.transition(RuntimeState::Starting, RuntimeState::Running) {
            self.service.start(args);
            info!(target: CONTROL_TARGET, "service start returned");
        } else {
            info!(target: CONTROL_TARGET, "stop requested before start; skipping start");
        }
        drop(execution);

        session.close_socket();
        if let Some(signals) = signals {
            signals.close();
        }
        handle.join()?;
        session.set_state(RuntimeState::NotRunning);
        Ok(ExitCode::SUCCESS)
    }
}
