use serde::{Deserialize, Serialize};
use strum::Display;

/// Lifecycle verbs understood by the service controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Verb {
    /// Launch a detached `run` process and probe it.
    Start,
    /// Host the service in the current process.
    Run,
    /// Ask a running service to stop.
    Stop,
    /// Stop, wait for the settle delay, then start.
    Restart,
    /// Print the status reported by a running service.
    Status,
}

/// Spellings used for each lifecycle verb.
///
/// The strings only ever travel as the command line of a control frame, so
/// any of them can be localised without touching the wire protocol.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct VerbSet {
    start: String,
    run: String,
    stop: String,
    restart: String,
    status: String,
}

impl Default for VerbSet {
    fn default() -> Self {
        Self {
            start: "start".to_owned(),
            run: "run".to_owned(),
            stop: "stop".to_owned(),
            restart: "restart".to_owned(),
            status: "status".to_owned(),
        }
    }
}

impl VerbSet {
    /// Overrides the spelling of the `start` verb.
    #[must_use]
    pub fn with_start(mut self, verb: impl Into<String>) -> Self {
        self.start = verb.into();
        self
    }

    /// Overrides the spelling of the `run` verb.
    #[must_use]
    pub fn with_run(mut self, verb: impl Into<String>) -> Self {
        self.run = verb.into();
        self
    }

    /// Overrides the spelling of the `stop` verb.
    #[must_use]
    pub fn with_stop(mut self, verb: impl Into<String>) -> Self {
        self.stop = verb.into();
        self
    }

    /// Overrides the spelling of the `restart` verb.
    #[must_use]
    pub fn with_restart(mut self, verb: impl Into<String>) -> Self {
        self.restart = verb.into();
        self
    }

    /// Overrides the spelling of the `status` verb.
    #[must_use]
    pub fn with_status(mut self, verb: impl Into<String>) -> Self {
        self.status = verb.into();
        self
    }

    /// Returns the configured spelling of `verb`.
    #[must_use]
    pub fn spelling(&self, verb: Verb) -> &str {
        match verb {
            Verb::Start => &self.start,
            Verb::Run => &self.run,
            Verb::Stop => &self.stop,
            Verb::Restart => &self.restart,
            Verb::Status => &self.status,
        }
    }

    /// Maps a command token onto a verb.
    ///
    /// Verbs are checked in the order start, run, stop, restart, status, so
    /// a spelling shared by two verbs resolves to the earlier one.
    #[must_use]
    pub fn classify(&self, command: &str) -> Option<Verb> {
        [Verb::Start, Verb::Run, Verb::Stop, Verb::Restart, Verb::Status]
            .into_iter()
            .find(|verb| self.spelling(*verb) == command)
    }

    /// Renders the usage line for `program`.
    #[must_use]
    pub fn usage(&self, program: &str) -> String {
        format!(
            "Usage: {program} {{{}|{}|{}|{}}}",
            self.start, self.stop, self.restart, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("start", Some(Verb::Start))]
    #[case("run", Some(Verb::Run))]
    #[case("stop", Some(Verb::Stop))]
    #[case("restart", Some(Verb::Restart))]
    #[case("status", Some(Verb::Status))]
    #[case("reload", None)]
    #[case("STOP", None)]
    fn default_spellings_classify(#[case] command: &str, #[case] expected: Option<Verb>) {
        assert_eq!(VerbSet::default().classify(command), expected);
    }

    #[test]
    fn overridden_verbs_replace_defaults() {
        let verbs = VerbSet::default()
            .with_start("iniciar")
            .with_stop("parar");
        assert_eq!(verbs.classify("iniciar"), Some(Verb::Start));
        assert_eq!(verbs.classify("parar"), Some(Verb::Stop));
        assert_eq!(verbs.classify("start"), None);
        assert_eq!(verbs.classify("status"), Some(Verb::Status));
    }

    #[test]
    fn usage_lists_client_verbs() {
        let usage = VerbSet::default().with_restart("bounce").usage("clock");
        assert_eq!(usage, "Usage: clock {start|stop|bounce|status}");
    }
}
