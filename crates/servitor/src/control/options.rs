//! Embedding-time options for [`ServiceController`](super::ServiceController).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use servitor_config::{ServiceEndpoint, VerbSet};

use crate::client::CONNECTION_TIMEOUT;
use crate::launcher::{ProcessLauncher, SystemLauncher};

/// Settings chosen by the embedding application rather than by the user.
#[derive(Clone)]
pub struct ControllerOptions {
    pub(crate) verbs: VerbSet,
    pub(crate) program: Option<String>,
    pub(crate) executable: Option<PathBuf>,
    pub(crate) endpoint: Option<ServiceEndpoint>,
    pub(crate) launcher: Arc<dyn ProcessLauncher>,
    pub(crate) connect_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            verbs: VerbSet::default(),
            program: None,
            executable: None,
            endpoint: None,
            launcher: Arc::new(SystemLauncher),
            connect_timeout: CONNECTION_TIMEOUT,
        }
    }
}

impl fmt::Debug for ControllerOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ControllerOptions")
            .field("verbs", &self.verbs)
            .field("program", &self.program)
            .field("executable", &self.executable)
            .field("endpoint", &self.endpoint)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl ControllerOptions {
    /// Replaces the verb spellings.
    #[must_use]
    pub fn with_verbs(mut self, verbs: VerbSet) -> Self {
        self.verbs = verbs;
        self
    }

    /// Program name shown in usage text. Defaults to the file stem of the
    /// invoked executable.
    #[must_use]
    pub fn with_program_name(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Executable spawned by `start`. Defaults to the running executable.
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Control endpoint taking precedence over the configured host and port.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: ServiceEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Replaces the process launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Bound on establishing control connections.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Verb spellings in effect.
    #[must_use]
    pub const fn verbs(&self) -> &VerbSet {
        &self.verbs
    }
}
