//! Logging seam for the orchestrator.
//!
//! The deployer and command runner only need two levels: Info for
//! progress and forwarded stdout, Warning for forwarded stderr and
//! swallowed cleanup failures.

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
}

/// Structured sink for orchestration output.
///
/// Implementations must be safe to share across the runner's stdout and
/// stderr reader threads.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, error: Option<&Error>);

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    fn warn(&self, message: &str, error: Option<&Error>) {
        self.log(LogLevel::Warning, message, error);
    }
}

/// Default logger: prefixed status lines on stderr.
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn log(&self, level: LogLevel, message: &str, error: Option<&Error>) {
        let prefix = match level {
            LogLevel::Info => "deploy",
            LogLevel::Warning => "deploy:warn",
        };
        match error {
            Some(err) => eprintln!("[{}] {}: {}", prefix, message, err),
            None => eprintln!("[{}] {}", prefix, message),
        }
    }
}
