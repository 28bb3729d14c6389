//! Errors surfaced by the service controller.

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::client::ClientError;
use crate::frame::FrameError;
use crate::launcher::LaunchError;
use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

/// Failures that end a controller invocation.
///
/// Conditions with a dedicated hook (nothing listening, port already taken,
/// unknown verb) are not errors; they are reported through the
/// [`Service`](crate::Service) hooks instead.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Layered configuration could not be loaded.
    #[error("failed to load configuration: {0}")]
    Config(Arc<ortho_config::OrthoError>),
    /// Telemetry could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// A command-line argument cannot travel over the control protocol.
    #[error("argument is not valid UTF-8: {}", argument.to_string_lossy())]
    NonUtf8Argument { argument: OsString },
    /// A request frame could not be built.
    #[error("invalid control request: {0}")]
    Frame(#[from] FrameError),
    /// Talking to the running service failed.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// The service process could not be spawned.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// The control listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// Termination signal handlers could not be installed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        #[source]
        source: io::Error,
    },
    /// Writing user-facing output failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
