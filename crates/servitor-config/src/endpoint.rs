use std::fmt;

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_CONTROL_HOST, DEFAULT_CONTROL_PORT};

/// Address of the control socket a service listens on.
///
/// The endpoint is expected to name the local host. Nothing stops a caller
/// from pointing it elsewhere, but the protocol carries no authentication.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ServiceEndpoint {
    /// Host name or IP address of the control socket.
    pub host: String,
    /// TCP port of the control socket.
    pub port: u16,
}

impl ServiceEndpoint {
    /// Builds an endpoint for an arbitrary host.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Builds an endpoint on the IPv4 loopback interface.
    #[must_use]
    pub fn loopback(port: u16) -> Self {
        Self::new(DEFAULT_CONTROL_HOST, port)
    }
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self::loopback(DEFAULT_CONTROL_PORT)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "tcp://{}:{}", self.host, self.port)
    }
}
