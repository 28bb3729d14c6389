//! Listener implementation for the control socket.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use servitor_config::ServiceEndpoint;
use tracing::{info, warn};

use super::session::RunSession;
use super::{ConnectionHandler, Exchange, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const LISTENER_THREAD_NAME: &str = "servitor-control-listener";

/// A bound, not yet serving, control socket.
#[derive(Debug)]
pub struct ControlListener {
    endpoint: ServiceEndpoint,
    listener: TcpListener,
}

impl ControlListener {
    /// Binds the control socket. Failure here is the signal that another
    /// instance, or some other process, already owns the port.
    pub fn bind(endpoint: &ServiceEndpoint) -> Result<Self, ListenerError> {
        let listener = bind_tcp(&endpoint.host, endpoint.port)?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Endpoint this listener was bound for.
    #[must_use]
    pub const fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Hands the socket to a new [`RunSession`].
    pub fn into_session(self) -> Result<Arc<RunSession>, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        Ok(Arc::new(RunSession::new(self.listener)))
    }
}

/// Handle to the background listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    session: Arc<RunSession>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Starts the accept loop for `session` on a dedicated thread.
    pub fn spawn(
        session: Arc<RunSession>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Self, ListenerError> {
        let loop_session = Arc::clone(&session);
        let handle = thread::Builder::new()
            .name(LISTENER_THREAD_NAME.to_owned())
            .spawn(move || run_accept_loop(&loop_session, handler.as_ref()))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(Self {
            session,
            handle: Some(handle),
        })
    }

    /// Closes the socket and waits for the loop to exit.
    pub fn shutdown(self) -> Result<(), ListenerError> {
        self.session.close_socket();
        self.join()
    }

    /// Waits for the loop to exit.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.session.stop_listening();
        }
    }
}

fn run_accept_loop(session: &RunSession, handler: &dyn ConnectionHandler) {
    info!(target: LISTENER_TARGET, "control listener active");
    while session.keep_listening() {
        let slot = session.lock_socket();
        let Some(listener) = slot.as_ref() else {
            break;
        };
        match accept_connection(listener) {
            Ok(Some(stream)) => {
                // The shutdown region stays held until the exchange is over.
                if handler.handle(stream) == Exchange::Finished {
                    session.stop_listening();
                }
                drop(slot);
            }
            Ok(None) => {
                drop(slot);
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                drop(slot);
                warn!(
                    target: LISTENER_TARGET,
                    error = %error,
                    "control socket accept failed; listener exiting"
                );
                break;
            }
        }
    }
    session.close_socket();
    info!(target: LISTENER_TARGET, "control listener stopped");
}

fn accept_connection(listener: &TcpListener) -> io::Result<Option<TcpStream>> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ) =>
        {
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}
