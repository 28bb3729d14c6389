//! Per-connection handling for the control listener.

use std::io::BufReader;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use servitor_config::{Verb, VerbSet};
use tracing::{debug, warn};

use super::LISTENER_TARGET;
use super::session::{RunSession, RuntimeState};
use crate::frame::{CommandFrame, FrameError, ResponseFrame};
use crate::service::Service;

/// Bound on how long a connected client may take to send its request.
pub(crate) const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// What the accept loop should do after an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// Keep accepting connections.
    Continue,
    /// Leave the accept loop.
    Finished,
}

/// Serves one accepted connection to completion.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream) -> Exchange;
}

/// Dispatches control frames to a [`Service`].
pub struct CommandDispatcher {
    service: Arc<dyn Service>,
    verbs: VerbSet,
    session: Arc<RunSession>,
}

impl CommandDispatcher {
    /// Builds a dispatcher bound to one run session.
    pub fn new(service: Arc<dyn Service>, verbs: VerbSet, session: Arc<RunSession>) -> Self {
        Self {
            service,
            verbs,
            session,
        }
    }

    fn read_frame(stream: &TcpStream) -> Result<CommandFrame, FrameError> {
        stream.set_read_timeout(Some(CONNECTION_READ_TIMEOUT))?;
        let mut reader = BufReader::new(stream);
        CommandFrame::decode(&mut reader)
    }

    fn acknowledge_stop(&self, frame: &CommandFrame, mut stream: TcpStream) -> Exchange {
        self.session.set_state(RuntimeState::Stopping);
        self.service.stop(frame.args());
        self.session.stop_listening();
        // Blocks until the run flow has left `Service::start`.
        let _execution = self.session.lock_execution();
        respond(&mut stream, &ResponseFrame::empty());
        drop(stream);
        Exchange::Finished
    }
}

impl ConnectionHandler for CommandDispatcher {
    fn handle(&self, mut stream: TcpStream) -> Exchange {
        let frame = match Self::read_frame(&stream) {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                debug!(
                    target: LISTENER_TARGET,
                    "client disconnected before sending a request"
                );
                return Exchange::Continue;
            }
            Err(error) => {
                warn!(
                    target: LISTENER_TARGET,
                    error = %error,
                    "discarding malformed control request"
                );
                return Exchange::Continue;
            }
        };
        debug!(
            target: LISTENER_TARGET,
            command = frame.command(),
            args = frame.args().len(),
            "control request received"
        );

        match self.verbs.classify(frame.command()) {
            Some(Verb::Stop | Verb::Restart) => self.acknowledge_stop(&frame, stream),
            Some(Verb::Status) => {
                let status = self.service.status(frame.args());
                respond(&mut stream, &ResponseFrame::from_text(&status));
                Exchange::Continue
            }
            _ => {
                respond(&mut stream, &ResponseFrame::from_text(frame.command()));
                Exchange::Continue
            }
        }
    }
}

fn respond(stream: &mut TcpStream, response: &ResponseFrame) {
    if let Err(error) = response.encode(stream) {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            "failed to write control response"
        );
    }
}
