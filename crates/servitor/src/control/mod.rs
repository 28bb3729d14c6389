//! Lifecycle verbs.
//!
//! [`ServiceController`] routes the verb of one invocation. `run` hosts the
//! service in the current process; `start` spawns a detached `run` process
//! and probes it; `stop`, `restart`, and `status` are clients of the control
//! socket of a running instance.

mod controller;
mod error;
mod options;
mod run;
mod signals;

pub use self::controller::{START_PROBE, ServiceController};
pub use self::error::ControlError;
pub use self::options::ControllerOptions;

pub(crate) const CONTROL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::control");
