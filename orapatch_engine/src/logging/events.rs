//! Event system for the run log

use super::codes::{self, Code};
use chrono::{DateTime, Local};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Matching level of the `log` facade
    pub fn as_log_level(&self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

/// Core log event structure
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub code: Code,
    pub message: String,
    /// Whether the run-log line carries the timestamp prefix
    pub timestamped: bool,
    pub context: Vec<(String, String)>,
}

impl LogEvent {
    fn build(level: LogLevel, code: Code, message: &str) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            code,
            message: message.to_string(),
            timestamped: true,
            context: Vec::new(),
        }
    }

    /// Create a new error event
    pub fn error(error_code: Code, message: &str) -> Self {
        Self::build(LogLevel::Error, error_code, message)
    }

    /// Create a new warning event
    pub fn warning(message: &str) -> Self {
        Self::build(LogLevel::Warning, codes::generic::WARNING, message)
    }

    /// Create a new info event
    pub fn info(message: &str) -> Self {
        Self::build(LogLevel::Info, codes::progress::GENERIC, message)
    }

    /// Create info with specific code
    pub fn info_with_code(info_code: Code, message: &str) -> Self {
        Self::build(LogLevel::Info, info_code, message)
    }

    /// Create a debug event
    pub fn debug(message: &str) -> Self {
        Self::build(LogLevel::Debug, codes::generic::DEBUG, message)
    }

    /// Drop the timestamp prefix from the run-log line
    pub fn without_timestamp(mut self) -> Self {
        self.timestamped = false;
        self
    }

    /// Add context data
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.push((key.to_string(), value.to_string()));
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }

    /// Line as written to the run log
    pub fn format_line(&self) -> String {
        let mut line = if self.timestamped {
            format!("{}\t{}", self.timestamp.format("%c"), self.message)
        } else {
            self.message.clone()
        };

        for (key, value) in &self.context {
            line.push_str(&format!(" [{}={}]", key, value));
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untimestamped_line_is_bare_message() {
        let event = LogEvent::info("orapatch session start").without_timestamp();
        assert_eq!(event.format_line(), "orapatch session start");
    }

    #[test]
    fn test_timestamped_line_has_tab_separator() {
        let event = LogEvent::info("Stop instance: ORCL");
        let line = event.format_line();
        assert!(line.ends_with("\tStop instance: ORCL"));
    }

    #[test]
    fn test_context_is_appended() {
        let event = LogEvent::error(codes::failure::COMMAND_EXECUTION, "boom")
            .without_timestamp()
            .with_context("command", "ls");
        assert_eq!(event.format_line(), "boom [command=ls]");
        assert!(event.is_error());
    }
}
