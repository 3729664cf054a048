use clap::ValueEnum;
use tracing::Level;

/// Verbosity of the diagnostic log on stderr. The build report itself is
/// always printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogLevel {
    /// Every store change and cache hit.
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Option<Level> {
        Some(match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
            LogLevel::Silent => return None,
        })
    }

    /// Module paths only help when following a build step by step.
    pub fn shows_targets(self) -> bool {
        matches!(self, LogLevel::Trace | LogLevel::Debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LogLevel::Trace, Some(Level::TRACE), true)]
    #[case(LogLevel::Debug, Some(Level::DEBUG), true)]
    #[case(LogLevel::Warn, Some(Level::WARN), false)]
    #[case(LogLevel::Silent, None, false)]
    fn test_log_level_configures_subscriber(
        #[case] level: LogLevel,
        #[case] expected: Option<Level>,
        #[case] targets: bool,
    ) {
        assert_eq!(level.to_tracing_level(), expected);
        assert_eq!(level.shows_targets(), targets);
    }

    #[test]
    fn test_log_level_parses_from_cli_names() {
        assert_eq!(LogLevel::from_str("trace", true), Ok(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("silent", true), Ok(LogLevel::Silent));
        assert!(LogLevel::from_str("loud", true).is_err());
    }
}
