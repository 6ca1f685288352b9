use std::str::FromStr;

use crate::logger::error::LoggerError;

/// Where and how log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggerFormat {
    /// Journald when stderr is already captured by the journal, text otherwise.
    #[default]
    Auto,
    Text,
    Json,
    Journald,
}

impl LoggerFormat {
    pub fn journald_available() -> bool {
        cfg!(all(target_os = "linux", feature = "journald"))
    }

    /// Collapse [`LoggerFormat::Auto`] given whether stderr is connected to the journal.
    pub fn resolve(self, under_journal: bool) -> LoggerFormat {
        match self {
            LoggerFormat::Auto if under_journal && Self::journald_available() => LoggerFormat::Journald,
            LoggerFormat::Auto => LoggerFormat::Text,
            other => other,
        }
    }
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(LoggerFormat::Auto),
            "text" | "plain" => Ok(LoggerFormat::Text),
            "json" => Ok(LoggerFormat::Json),
            "journald" | "journal" if Self::journald_available() => Ok(LoggerFormat::Journald),
            "journald" | "journal" => Err(LoggerError::JournaldNotSupported),
            _ => Err(LoggerError::InvalidFormat(s.to_string())),
        }
    }
}
