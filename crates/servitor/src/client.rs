//! Client side of the control protocol.
//!
//! Each exchange opens one connection, writes one [`CommandFrame`], and
//! reads one [`ResponseFrame`]. Connection failures that mean "nothing is
//! listening" are reported as [`ClientError::NotRunning`] so the controller
//! can route them to the service's not-running hook.

use std::io::{self, BufReader};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use servitor_config::ServiceEndpoint;
use thiserror::Error;
use tracing::debug;

use crate::frame::{CommandFrame, FrameError, ResponseFrame};

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Default bound on establishing a control connection.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while talking to a running service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint host did not resolve.
    #[error("failed to resolve control endpoint {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Nothing accepted the connection.
    #[error("no service is listening on {endpoint}: {source}")]
    NotRunning {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// The connection failed for a reason other than a refusal.
    #[error("failed to connect to control endpoint {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Writing the request failed.
    #[error("failed to send control request: {0}")]
    Send(#[source] FrameError),
    /// Reading the response failed.
    #[error("failed to read control response: {0}")]
    Receive(#[source] FrameError),
}

impl ClientError {
    /// Whether the failure means no service is listening.
    #[must_use]
    pub const fn is_not_running(&self) -> bool {
        matches!(self, Self::NotRunning { .. })
    }
}

/// Sends `frame` to `endpoint` and waits for the complete response.
///
/// Only the connection attempt is bounded by `timeout`; a stop request may
/// legitimately wait as long as the service takes to wind down.
pub fn exchange(
    endpoint: &ServiceEndpoint,
    frame: &CommandFrame,
    timeout: Duration,
) -> Result<ResponseFrame, ClientError> {
    let mut stream = connect(endpoint, timeout)?;
    debug!(
        target: CLIENT_TARGET,
        endpoint = %endpoint,
        command = frame.command(),
        "sending control request"
    );
    frame.encode(&mut stream).map_err(ClientError::Send)?;
    let mut reader = BufReader::new(&stream);
    let response = ResponseFrame::decode(&mut reader).map_err(ClientError::Receive)?;
    debug!(
        target: CLIENT_TARGET,
        endpoint = %endpoint,
        lines = response.lines().len(),
        "control response received"
    );
    Ok(response)
}

/// Checks whether something accepts connections on `endpoint`.
pub fn is_reachable(endpoint: &ServiceEndpoint, timeout: Duration) -> Result<bool, ClientError> {
    match connect(endpoint, timeout) {
        Ok(_stream) => Ok(true),
        Err(ClientError::NotRunning { .. }) => Ok(false),
        Err(error) => Err(error),
    }
}

fn connect(endpoint: &ServiceEndpoint, timeout: Duration) -> Result<TcpStream, ClientError> {
    let address = resolve(endpoint).map_err(|source| ClientError::Resolve {
        endpoint: endpoint.to_string(),
        source,
    })?;
    TcpStream::connect_timeout(&address, timeout).map_err(|source| {
        if indicates_not_running(&source) {
            ClientError::NotRunning {
                endpoint: endpoint.to_string(),
                source,
            }
        } else {
            ClientError::Connect {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    })
}

fn resolve(endpoint: &ServiceEndpoint) -> io::Result<SocketAddr> {
    let mut addrs = (endpoint.host.as_str(), endpoint.port).to_socket_addrs()?;
    addrs
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved address"))
}

/// Whether a connect error means no process is listening.
///
/// `ConnectionReset` is excluded: a reset means a peer accepted and then
/// dropped the connection.
fn indicates_not_running(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotFound
            | io::ErrorKind::AddrNotAvailable
    )
}
