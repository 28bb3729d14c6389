//! Termination signals for the `run` verb.

pub(crate) use self::platform::SignalWatcher;

#[cfg(unix)]
mod platform {
    use std::sync::Arc;
    use std::thread;

    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
    use signal_hook::iterator::{Handle, Signals};
    use tracing::{info, warn};

    use super::super::{CONTROL_TARGET, ControlError};
    use crate::service::Service;
    use crate::transport::{RunSession, RuntimeState};

    const SIGNAL_THREAD_NAME: &str = "servitor-signals";

    /// Turns the first termination signal into a stop request.
    pub(crate) struct SignalWatcher {
        handle: Handle,
        thread: Option<thread::JoinHandle<()>>,
    }

    impl SignalWatcher {
        pub(crate) fn install(
            service: Arc<dyn Service>,
            session: Arc<RunSession>,
        ) -> Result<Self, ControlError> {
            let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
                .map_err(|source| ControlError::Signals { source })?;
            let handle = signals.handle();
            let thread = thread::Builder::new()
                .name(SIGNAL_THREAD_NAME.to_owned())
                .spawn(move || {
                    if let Some(signal) = signals.forever().next() {
                        info!(target: CONTROL_TARGET, signal, "termination signal received");
                        session.set_state(RuntimeState::Stopping);
                        service.stop(&[]);
                        session.stop_listening();
                    }
                })
                .map_err(|source| ControlError::Signals { source })?;
            Ok(Self {
                handle,
                thread: Some(thread),
            })
        }

        /// Unregisters the handlers and waits for the watcher thread.
        pub(crate) fn close(mut self) {
            self.handle.close();
            if let Some(thread) = self.thread.take()
                && thread.join().is_err()
            {
                warn!(target: CONTROL_TARGET, "signal watcher panicked");
            }
        }
    }

    impl Drop for SignalWatcher {
        fn drop(&mut self) {
            self.handle.close();
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use std::sync::Arc;

    use super::super::ControlError;
    use crate::service::Service;
    use crate::transport::RunSession;

    /// Signal handling is a no-op off Unix.
    pub(crate) struct SignalWatcher;

    impl SignalWatcher {
        pub(crate) fn install(
            _service: Arc<dyn Service>,
            _session: Arc<RunSession>,
        ) -> Result<Self, ControlError> {
            Ok(Self)
        }

        pub(crate) fn close(self) {}
    }
}
