//! Shared fixtures for controller tests.
//!
//! `run` invocations execute on background threads inside the test process;
//! [`ThreadLauncher`] stands in for the detached child process so `start`
//! and `restart` can be observed end to end.

use std::ffi::OsString;
use std::io;
use std::net::TcpListener;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use servitor_config::{Config, ServiceEndpoint, Verb, VerbSet};

use crate::client;
use crate::launcher::{LaunchError, LaunchSpec, ProcessLauncher};
use crate::{ControlOutput, ControllerOptions, HookContext, Service, ServiceController};

pub(crate) const SETTLE_DELAY: Duration = Duration::from_millis(150);
pub(crate) const TEST_PROGRAM: &str = "servitor-test";

/// Observable milestones, shared between client and run sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    StartEntered,
    StartReturned,
    StopRequested,
    StopAcknowledged,
    Started,
    NotRunning,
    AlreadyRunning,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    fn events(&self) -> MutexGuard<'_, Vec<Event>> {
        self.0.lock().expect("event log lock")
    }

    pub(crate) fn push(&self, event: Event) {
        self.events().push(event);
    }

    pub(crate) fn snapshot(&self) -> Vec<Event> {
        self.events().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.events().len()
    }

    pub(crate) fn since(&self, mark: usize) -> Vec<Event> {
        self.events().iter().skip(mark).copied().collect()
    }

    pub(crate) fn count(&self, event: Event) -> usize {
        self.events().iter().filter(|seen| **seen == event).count()
    }

    pub(crate) fn position(&self, event: Event) -> Option<usize> {
        self.events().iter().position(|seen| *seen == event)
    }
}

/// Service that blocks in `start` until stopped, then lingers for
/// `finish_delay` before returning.
pub(crate) struct RecordingService {
    log: EventLog,
    stop_requested: AtomicBool,
    finish_delay: Duration,
    status: String,
}

impl RecordingService {
    pub(crate) fn new(log: EventLog) -> Self {
        Self {
            log,
            stop_requested: AtomicBool::new(false),
            finish_delay: Duration::ZERO,
            status: crate::DEFAULT_STATUS.to_owned(),
        }
    }

    pub(crate) fn with_finish_delay(mut self, delay: Duration) -> Self {
        self.finish_delay = delay;
        self
    }

    pub(crate) fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

impl Service for RecordingService {
    fn start(&self, _args: &[String]) {
        self.log.push(Event::StartEntered);
        while !self.stop_requested.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(self.finish_delay);
        self.log.push(Event::StartReturned);
    }

    fn stop(&self, _args: &[String]) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.log.push(Event::StopRequested);
    }

    fn status(&self, _args: &[String]) -> String {
        self.status.clone()
    }

    fn on_not_running(
        &self,
        _context: &HookContext<'_>,
        output: &mut ControlOutput<'_>,
    ) -> io::Result<()> {
        self.log.push(Event::NotRunning);
        output.stderr_line(format_args!("The service is not running"))
    }

    fn on_already_running(
        &self,
        context: &HookContext<'_>,
        output: &mut ControlOutput<'_>,
    ) -> io::Result<()> {
        self.log.push(Event::AlreadyRunning);
        output.stderr_line(format_args!(
            "The service is already running, or another process is using the port {}.",
            context.endpoint.port
        ))
    }

    fn on_started(
        &self,
        _context: &HookContext<'_>,
        _output: &mut ControlOutput<'_>,
    ) -> io::Result<()> {
        self.log.push(Event::Started);
        Ok(())
    }

    fn on_stopped(
        &self,
        _context: &HookContext<'_>,
        _output: &mut ControlOutput<'_>,
    ) -> io::Result<()> {
        self.log.push(Event::StopAcknowledged);
        Ok(())
    }
}

/// Captured result of one controller invocation.
#[derive(Debug)]
pub(crate) struct Invocation {
    pub(crate) exit: ExitCode,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

/// Executes `command` against `controller`, capturing both streams.
pub(crate) fn invoke(controller: &ServiceController, command: &[&str]) -> Invocation {
    let command: Vec<String> = command.iter().map(|part| (*part).to_owned()).collect();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = {
        let mut output = ControlOutput::new(&mut stdout, &mut stderr);
        controller
            .execute(&command, &mut output)
            .expect("controller invocation")
    };
    Invocation {
        exit,
        stdout: String::from_utf8(stdout).expect("utf8 stdout"),
        stderr: String::from_utf8(stderr).expect("utf8 stderr"),
    }
}

/// Runs the `run` verb of `controller` on a background thread.
pub(crate) fn spawn_run(controller: ServiceController) -> thread::JoinHandle<Invocation> {
    let verb = controller.options().verbs().spelling(Verb::Run).to_owned();
    thread::Builder::new()
        .name("service-run".to_owned())
        .spawn(move || invoke(&controller, &[verb.as_str()]))
        .expect("spawn run thread")
}

/// Reserves an ephemeral loopback port and releases it.
pub(crate) fn free_endpoint() -> ServiceEndpoint {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    ServiceEndpoint::loopback(port)
}

pub(crate) fn test_config(endpoint: &ServiceEndpoint) -> Config {
    Config::default()
        .with_endpoint(endpoint.clone())
        .with_settle_delay(SETTLE_DELAY)
        .with_signal_handling(false)
}

pub(crate) fn controller(
    service: Arc<dyn Service>,
    endpoint: &ServiceEndpoint,
    options: ControllerOptions,
) -> ServiceController {
    ServiceController::new(
        service,
        test_config(endpoint),
        options.with_program_name(TEST_PROGRAM),
    )
    .with_forwarded_flags(child_flags())
}

/// Flags forwarded to launched `run` invocations.
pub(crate) fn child_flags() -> Vec<OsString> {
    ["--signals", "ignore", "--log-filter", "warn"]
        .into_iter()
        .map(OsString::from)
        .collect()
}

/// Polls until something accepts connections on `endpoint`.
pub(crate) fn wait_until_reachable(endpoint: &ServiceEndpoint) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if client::is_reachable(endpoint, Duration::from_millis(200)).unwrap_or(false) {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

/// Polls until nothing accepts connections on `endpoint`.
pub(crate) fn wait_until_unreachable(endpoint: &ServiceEndpoint) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if !client::is_reachable(endpoint, Duration::from_millis(200)).unwrap_or(true) {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

type ServiceFactory = dyn Fn() -> Arc<dyn Service> + Send + Sync;

/// Launcher that hosts each `run` on a thread of the test process.
///
/// The child receives the same argument vector a real process would, so
/// forwarded configuration flags go through the layered loader.
pub(crate) struct ThreadLauncher {
    factory: Box<ServiceFactory>,
    verbs: VerbSet,
    launched: Mutex<Vec<(Vec<OsString>, thread::JoinHandle<ExitCode>)>>,
}

impl ThreadLauncher {
    pub(crate) fn new(
        verbs: VerbSet,
        factory: impl Fn() -> Arc<dyn Service> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            verbs,
            launched: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn launch_count(&self) -> usize {
        self.launched.lock().expect("launch lock").len()
    }

    pub(crate) fn command_lines(&self) -> Vec<Vec<OsString>> {
        self.launched
            .lock()
            .expect("launch lock")
            .iter()
            .map(|(argv, _)| argv.clone())
            .collect()
    }

    /// Waits for every hosted `run` to return.
    pub(crate) fn join_all(&self) -> Vec<ExitCode> {
        let launched = std::mem::take(&mut *self.launched.lock().expect("launch lock"));
        launched
            .into_iter()
            .map(|(_, handle)| handle.join().expect("run thread panicked"))
            .collect()
    }
}

impl ProcessLauncher for ThreadLauncher {
    fn spawn(&self, spec: &LaunchSpec, args: &[String]) -> Result<(), LaunchError> {
        let mut argv = vec![OsString::from(spec.program())];
        argv.extend(spec.command_line(args));
        let service = (self.factory)();
        let options = ControllerOptions::default().with_verbs(self.verbs.clone());
        let child_argv = argv.clone();
        let handle = thread::Builder::new()
            .name("launched-run".to_owned())
            .spawn(move || {
                let mut stdout = Vec::new();
                let mut stderr = Vec::new();
                crate::run(service, options, child_argv, &mut stdout, &mut stderr)
            })
            .map_err(|source| LaunchError::Spawn {
                program: spec.program().clone(),
                source,
            })?;
        self.launched
            .lock()
            .expect("launch lock")
            .push((argv, handle));
        Ok(())
    }
}
