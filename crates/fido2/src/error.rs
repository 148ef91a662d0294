use std::time::Duration;

use thiserror::Error;

use crate::classify::ClassifiedError;

/// Result type for session controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for session controller operations
#[derive(Debug, Error)]
pub enum Error {
    /// The tool could not be run at all, or talking to it failed
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// The authenticator (through the tool) reported an error
    #[error(transparent)]
    Device(#[from] ClassifiedError),

    /// The tool did not finish or prompt within the bound
    #[error("{operation} timed out after {}s", after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("No device with number {0}; refresh the device list")]
    NoSuchDevice(usize),

    /// The operation needs the session PIN but none was supplied
    #[error("A PIN is required for this operation")]
    PinRequired,

    #[error("No device suitable for a factory reset was found")]
    NoResettableDevice,

    #[error("The reset window after replugging the key has elapsed; replug it and try again")]
    ReplugWindowElapsed,

    #[error("Invalid device handle pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// The classified device error, if this is one
    pub const fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Device(err) => Some(err),
            _ => None,
        }
    }
}

/// Process-level failures, kept apart from device-reported errors
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while talking to the tool: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pseudo-terminal error: {0}")]
    Pty(String),

    #[error("No terminal emulator found to run the command in")]
    NoTerminal,

    #[error("Tool exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

impl From<anyhow::Error> for ExecutionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Pty(err.to_string())
    }
}
