//! Shared state for one `run` invocation.
//!
//! A [`RunSession`] owns the two lock regions that order the run flow
//! against the listener thread:
//!
//! - the execution lock is held by the run flow for the whole call into
//!   `Service::start`; the listener takes it before acknowledging a stop, so
//!   the acknowledgement can only leave once `start` has returned.
//! - the shutdown lock guards the listening socket itself. The listener
//!   holds it while serving a connection and the run flow takes it to close
//!   the socket, so the socket never disappears mid-response.
//!
//! Both locks live and die with the session; nothing here is global.

use std::fmt;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::LISTENER_TARGET;

/// Lifecycle of the service hosted by a `run` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// No workload is executing.
    NotRunning,
    /// The socket is bound and the workload is about to start.
    Starting,
    /// `Service::start` has been invoked.
    Running,
    /// A stop request has been accepted.
    Stopping,
}

impl RuntimeState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::NotRunning => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Stopping => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::NotRunning,
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotRunning => "not_running",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        formatter.write_str(label)
    }
}

/// Locks, flags, and socket shared by the run flow and the listener.
#[derive(Debug)]
pub struct RunSession {
    execution: Mutex<()>,
    socket: Mutex<Option<TcpListener>>,
    keep_listening: AtomicBool,
    state: AtomicU8,
}

impl RunSession {
    pub(crate) fn new(listener: TcpListener) -> Self {
        Self {
            execution: Mutex::new(()),
            socket: Mutex::new(Some(listener)),
            keep_listening: AtomicBool::new(true),
            state: AtomicU8::new(RuntimeState::NotRunning.as_u8()),
        }
    }

    /// Enters the execution region.
    ///
    /// Poisoning is ignored: the region guards ordering, not data.
    pub(crate) fn lock_execution(&self) -> MutexGuard<'_, ()> {
        self.execution
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Enters the shutdown region, yielding the socket slot.
    pub(crate) fn lock_socket(&self) -> MutexGuard<'_, Option<TcpListener>> {
        self.socket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the listener should accept further connections.
    pub fn keep_listening(&self) -> bool {
        self.keep_listening.load(Ordering::SeqCst)
    }

    /// Tells the listener to leave its loop after the current exchange.
    pub(crate) fn stop_listening(&self) {
        self.keep_listening.store(false, Ordering::SeqCst);
    }

    /// Current runtime state.
    pub fn state(&self) -> RuntimeState {
        RuntimeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: RuntimeState) {
        let previous = RuntimeState::from_u8(self.state.swap(state.as_u8(), Ordering::SeqCst));
        if previous != state {
            info!(
                target: LISTENER_TARGET,
                from = %previous,
                to = %state,
                "service state changed"
            );
        }
    }

    /// Moves from `from` to `to` only if no other transition intervened.
    pub(crate) fn transition(&self, from: RuntimeState, to: RuntimeState) -> bool {
        let swapped = self
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if swapped {
            info!(
                target: LISTENER_TARGET,
                from = %from,
                to = %to,
                "service state changed"
            );
        }
        swapped
    }

    /// Stops listening and closes the socket inside the shutdown region.
    ///
    /// Returns `true` when this call closed the socket.
    pub(crate) fn close_socket(&self) -> bool {
        let mut slot = self.lock_socket();
        self.stop_listening();
        let closed = slot.take().is_some();
        if closed {
            info!(target: LISTENER_TARGET, "control socket closed");
        }
        closed
    }
}
