//! Structured logging for controller and `run` processes.
//!
//! Both sides of the control plane share one subscriber setup, but they log
//! at different levels. A `run` process reports its lifecycle at `info`:
//! the listener coming up, state transitions, the socket closing, and
//! termination signals. The client verbs (`start`, `stop`, `restart`,
//! `status`) only log at `debug`, so under the default `info` filter their
//! stderr carries nothing but hook messages. Spawned `run` processes have
//! their stderr detached; their logs are only visible when the service is
//! run in the foreground.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use servitor_config::{Config, LogFormat};
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The `--log-filter` expression did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// The first call wins; later calls return a fresh [`TelemetryHandle`] and
/// ignore their configuration.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn control_filter(config: &Config) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
        filter: config.log_filter().to_owned(),
        message: error.to_string(),
    })
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = control_filter(config)?;

    // Thread names tell the run flow apart from the listener and the
    // signal watcher.
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn invalid_filter_names_the_expression() {
        let config = Config::default().with_log_filter("servitor=loudest");
        let error = install_subscriber(&config).expect_err("filter should be rejected");
        match error {
            TelemetryError::Filter { filter, .. } => assert_eq!(filter, "servitor=loudest"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    #[case::default_level("info")]
    #[case::per_target("servitor::transport=debug,servitor::client=trace,warn")]
    fn control_targets_are_accepted(#[case] expression: &str) {
        let config = Config::default().with_log_filter(expression);
        assert!(control_filter(&config).is_ok());
    }

    #[test]
    fn repeated_initialisation_is_idempotent() {
        let config = Config::default().with_log_filter("warn");
        initialise(&config).expect("first initialisation");
        initialise(&config).expect("second initialisation");
    }
}
