use crate::error::{CovtreeError, ErrorCode};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to capture {0}")]
    PipeUnavailable(&'static str),

    #[error("Failed to write stdin of '{command}': {source}")]
    Stdin {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read process output: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

/// Convert ProcessError to CovtreeError
impl From<ProcessError> for CovtreeError {
    fn from(err: ProcessError) -> Self {
        let message = err.to_string();
        match &err {
            ProcessError::CommandNotFound(program) => CovtreeError::spawn(
                ErrorCode::SPAWN_COMMAND_NOT_FOUND,
                message,
                Some(program.clone()),
            ),
            ProcessError::SpawnFailed { command, .. } => {
                CovtreeError::spawn(ErrorCode::SPAWN_GENERIC, message, Some(command.clone()))
            }
            ProcessError::PipeUnavailable(_) => {
                CovtreeError::spawn(ErrorCode::SPAWN_PIPE_UNAVAILABLE, message, None)
            }
            ProcessError::Stdin { command, .. } => CovtreeError::process_io(
                ErrorCode::PROCESS_IO_STDIN,
                message,
                Some(command.clone()),
            ),
            ProcessError::Read { .. } => {
                CovtreeError::process_io(ErrorCode::PROCESS_IO_STDOUT, message, None)
            }
            ProcessError::Wait { command, .. } => CovtreeError::process_io(
                ErrorCode::PROCESS_IO_WAIT,
                message,
                Some(command.clone()),
            ),
            ProcessError::Timeout(_) => {
                CovtreeError::process_io(ErrorCode::PROCESS_IO_TIMEOUT, message, None)
            }
            ProcessError::Io(_) | ProcessError::MockExpectationNotMet(_) => {
                CovtreeError::process_io(ErrorCode::PROCESS_IO_GENERIC, message, None)
            }
        }
        .with_source(err)
    }
}
