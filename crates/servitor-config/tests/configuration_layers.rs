//! Layering tests for [`servitor_config::Config`].

use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::rstest;
use servitor_config::{Config, LogFormat, ServiceEndpoint};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let guard = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` in edition 2024; `Drop` restores
        // the previous value.
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            guard: Some(guard),
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
        drop(self.guard.take());
    }
}

fn args(values: &[&str]) -> Vec<OsString> {
    std::iter::once("servitor-test")
        .chain(values.iter().copied())
        .map(OsString::from)
        .collect()
}

#[test]
fn bare_invocation_applies_defaults() {
    let _lock = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let config = Config::load_from_iter(args(&[])).expect("load defaults");
    assert_eq!(config.endpoint(), ServiceEndpoint::loopback(6400));
    assert_eq!(config.settle_delay(), Duration::from_millis(1000));
    assert_eq!(config.log_format(), LogFormat::Json);
}

#[rstest]
#[case::separate(&["--control-port", "7311"])]
#[case::inline(&["--control-port=7311"])]
fn cli_flag_sets_control_port(#[case] flags: &[&str]) {
    let _lock = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let config = Config::load_from_iter(args(flags)).expect("load with flag");
    assert_eq!(config.endpoint().port, 7311);
}

#[test]
fn environment_overrides_defaults_and_cli_overrides_environment() {
    let _env = EnvOverride::set_var("SERVITOR_CONTROL_PORT", OsStr::new("7400"));

    let from_env = Config::load_from_iter(args(&[])).expect("load from env");
    assert_eq!(from_env.endpoint().port, 7400);

    let from_cli =
        Config::load_from_iter(args(&["--control-port", "7500"])).expect("load from cli");
    assert_eq!(from_cli.endpoint().port, 7500);
}

#[test]
fn signal_mode_and_log_format_parse_from_flags() {
    let _lock = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let config = Config::load_from_iter(args(&["--signals", "ignore", "--log-format", "compact"]))
        .expect("load with flags");
    assert!(!config.handles_signals());
    assert_eq!(config.log_format(), LogFormat::Compact);
}
