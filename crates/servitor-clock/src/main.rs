//! A clock run as a background service.
//!
//! `servitor-clock start` launches the clock in a detached process that
//! prints the current time once per second; `status` reports the most
//! recent tick and `stop` ends it.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use servitor::{ControllerOptions, Service};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;

const TICK: Duration = Duration::from_secs(1);
const STOP_POLL: Duration = Duration::from_millis(50);
const NOT_EXECUTED: &str = "Not executed yet";

struct ClockService {
    keep_running: AtomicBool,
    last_tick: Mutex<String>,
}

impl ClockService {
    fn new() -> Self {
        Self {
            keep_running: AtomicBool::new(true),
            last_tick: Mutex::new(NOT_EXECUTED.to_owned()),
        }
    }

    fn tick(&self) {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let stamp = now.format(&Rfc2822).unwrap_or_else(|_| now.to_string());
        let mut stdout = io::stdout().lock();
        // The detached process has no terminal; losing a tick line is fine.
        let _written = writeln!(stdout, "{stamp}");
        *self
            .last_tick
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = stamp;
    }

    /// Sleeps one tick, waking early once a stop has been requested.
    fn wait_for_next_tick(&self) {
        let deadline = Instant::now() + TICK;
        while self.keep_running.load(Ordering::SeqCst) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(STOP_POLL));
        }
    }
}

impl Service for ClockService {
    fn start(&self, _args: &[String]) {
        while self.keep_running.load(Ordering::SeqCst) {
            self.tick();
            self.wait_for_next_tick();
        }
    }

    fn stop(&self, _args: &[String]) {
        self.keep_running.store(false, Ordering::SeqCst);
    }

    fn status(&self, _args: &[String]) -> String {
        self.last_tick
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn main() -> ExitCode {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    servitor::run(
        Arc::new(ClockService::new()),
        ControllerOptions::default(),
        std::env::args_os(),
        &mut stdout,
        &mut stderr,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_before_first_tick_is_placeholder() {
        let clock = ClockService::new();
        assert_eq!(clock.status(&[]), NOT_EXECUTED);
    }

    #[test]
    fn stop_before_start_returns_immediately() {
        let clock = ClockService::new();
        clock.stop(&[]);
        let started = Instant::now();
        clock.start(&[]);
        assert!(started.elapsed() < TICK);
        assert_eq!(clock.status(&[]), NOT_EXECUTED);
    }

    #[test]
    fn tick_records_the_latest_time() {
        let clock = ClockService::new();
        clock.tick();
        assert_ne!(clock.status(&[]), NOT_EXECUTED);
    }
}
