use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error in '{field}': {message}")]
    Config { field: String, message: String },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Remote {action} failed on '{host}' (exit {exit_code}): {detail}")]
    Execution {
        host: String,
        action: String,
        exit_code: i32,
        detail: String,
    },

    #[error("Remote {action} on '{host}' did not finish within {secs}s")]
    Timeout {
        host: String,
        action: String,
        secs: u64,
    },

    #[error("Deployment already performed; a deployer deploys exactly once")]
    AlreadyDeployed,

    #[error("Deployer has already been disposed")]
    Disposed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "CONFIG_ERROR",
            Error::PathNotFound(_) => "PATH_NOT_FOUND",
            Error::Execution { .. } => "EXECUTION_ERROR",
            Error::Timeout { .. } => "EXECUTION_TIMEOUT",
            Error::AlreadyDeployed => "ALREADY_DEPLOYED",
            Error::Disposed => "DISPOSED",
            Error::Io(_) => "IO_ERROR",
        }
    }
}
