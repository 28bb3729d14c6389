//! Control socket for the `run` side.
//!
//! The transport module binds the loopback control endpoint, accepts
//! connections on a background thread, and hands each one to a
//! [`ConnectionHandler`]. The [`RunSession`] couples that thread to the
//! run flow.

mod errors;
mod handler;
mod listener;
mod session;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub use self::handler::{CommandDispatcher, ConnectionHandler, Exchange};
pub use self::listener::{ControlListener, ListenerHandle};
pub use self::session::{RunSession, RuntimeState};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, wait_until};

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
