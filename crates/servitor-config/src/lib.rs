//! Configuration for services managed by `servitor`.
//!
//! [`Config`] is layered by `ortho_config`: built-in defaults, then any
//! discovered configuration file, then `SERVITOR_*` environment variables,
//! then command-line flags. The flags must precede the lifecycle verb on the
//! command line; the controller forwards them verbatim to the processes it
//! spawns so both sides agree on the control endpoint.
//!
//! Verb spellings are not part of the layered configuration. They belong to
//! the embedding application and are set in code through [`VerbSet`].

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod endpoint;
mod logging;
mod signals;
mod verbs;

pub use defaults::{
    DEFAULT_CONTROL_HOST, DEFAULT_CONTROL_PORT, DEFAULT_LOG_FILTER, DEFAULT_SETTLE_DELAY_MS,
    default_control_host, default_log_filter_string, default_log_format,
};
pub use endpoint::ServiceEndpoint;
pub use logging::{LogFormat, LogFormatParseError};
pub use signals::SignalMode;
pub use verbs::{Verb, VerbSet};

/// Command-line flags recognised by the configuration loader.
///
/// Keep in sync with the fields of [`Config`].
pub const CONFIG_CLI_FLAGS: &[&str] = &[
    "--control-host",
    "--control-port",
    "--settle-delay-ms",
    "--log-filter",
    "--log-format",
    "--signals",
];

/// Runtime configuration shared by every lifecycle verb.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SERVITOR")]
pub struct Config {
    /// Host of the control socket.
    #[ortho_config(default = default_control_host())]
    control_host: String,
    /// Port of the control socket.
    #[ortho_config(default = DEFAULT_CONTROL_PORT)]
    control_port: u16,
    /// Milliseconds to wait after spawning and between restart phases.
    #[ortho_config(default = DEFAULT_SETTLE_DELAY_MS)]
    settle_delay_ms: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    log_format: LogFormat,
    /// Whether `run` installs its own termination signal handlers.
    #[ortho_config(default = SignalMode::Handle)]
    signals: SignalMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_host: default_control_host(),
            control_port: DEFAULT_CONTROL_PORT,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            signals: SignalMode::Handle,
        }
    }
}

impl Config {
    /// Control endpoint derived from the host and port settings.
    #[must_use]
    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(self.control_host.clone(), self.control_port)
    }

    /// Delay applied after spawning a service and between restart phases.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Whether `run` should install its own termination signal handlers.
    #[must_use]
    pub const fn handles_signals(&self) -> bool {
        matches!(self.signals, SignalMode::Handle)
    }

    /// Replaces the control endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: ServiceEndpoint) -> Self {
        self.control_host = endpoint.host;
        self.control_port = endpoint.port;
        self
    }

    /// Replaces the settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enables or disables the `run` signal handlers.
    #[must_use]
    pub const fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.signals = if enabled {
            SignalMode::Handle
        } else {
            SignalMode::Ignore
        };
        self
    }

    /// Replaces the log filter expression.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}
