use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the `run` verb treats termination signals.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SignalMode {
    /// Termination signals request a graceful stop.
    #[default]
    Handle,
    /// Signals keep their default dispositions.
    Ignore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_modes() {
        assert_eq!("ignore".parse::<SignalMode>().ok(), Some(SignalMode::Ignore));
        assert_eq!("Handle".parse::<SignalMode>().ok(), Some(SignalMode::Handle));
        assert!("sometimes".parse::<SignalMode>().is_err());
    }
}
