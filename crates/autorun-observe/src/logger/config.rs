use std::io::IsTerminal;

use crate::logger::format::LoggerFormat;

/// Set by systemd for services whose stderr goes to the journal.
const JOURNAL_STREAM: &str = "JOURNAL_STREAM";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `autorun_core=debug,info`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    /// Identifier attached to journald entries.
    pub syslog_identifier: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Auto,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stderr().is_terminal(),
            syslog_identifier: "autorun".to_string(),
        }
    }
}

impl LoggerConfig {
    /// The concrete format for this process.
    pub fn effective_format(&self) -> LoggerFormat {
        self.format.resolve(std::env::var_os(JOURNAL_STREAM).is_some())
    }
}
