/// Control port used when nothing else is configured.
pub const DEFAULT_CONTROL_PORT: u16 = 6400;

/// Host the control socket binds to and clients connect to.
pub const DEFAULT_CONTROL_HOST: &str = "127.0.0.1";

/// Delay between spawning a service and probing it, and between the two
/// halves of a restart.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default control host as an owned value.
#[must_use]
pub fn default_control_host() -> String {
    DEFAULT_CONTROL_HOST.to_owned()
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
