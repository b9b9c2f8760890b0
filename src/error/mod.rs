use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for coverage collection
#[derive(Error, Debug)]
pub enum CovtreeError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Failed to start coverage tool: {message}")]
    Spawn {
        code: u16,
        message: String,
        command: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Coverage tool I/O error: {message}")]
    ProcessIo {
        code: u16,
        message: String,
        command: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Unparseable report line '{line}': {message}")]
    Parse {
        code: u16,
        message: String,
        line: String,
    },

    #[error("[E{code:04}] Cache state error at {}: {message}", path.display())]
    CacheState {
        code: u16,
        message: String,
        path: PathBuf,
    },

    #[error("[E{code:04}] Not found: {}", path.display())]
    NotFound { code: u16, path: PathBuf },
}

impl CovtreeError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create a spawn error with specific code and command line
    pub fn spawn(code: u16, message: impl Into<String>, command: Option<String>) -> Self {
        Self::Spawn {
            code,
            message: message.into(),
            command,
            source: None,
        }
    }

    /// Create a process I/O error with specific code and command line
    pub fn process_io(code: u16, message: impl Into<String>, command: Option<String>) -> Self {
        Self::ProcessIo {
            code,
            message: message.into(),
            command,
            source: None,
        }
    }

    pub fn parse(code: u16, message: impl Into<String>, line: impl Into<String>) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            line: line.into(),
        }
    }

    pub fn cache_state(code: u16, message: impl Into<String>, path: &Path) -> Self {
        Self::CacheState {
            code,
            message: message.into(),
            path: path.to_path_buf(),
        }
    }

    pub fn not_found(path: &Path) -> Self {
        Self::NotFound {
            code: ErrorCode::NOT_FOUND_GENERIC,
            path: path.to_path_buf(),
        }
    }

    /// Attach the file a configuration error refers to
    pub fn with_path(mut self, file: impl Into<PathBuf>) -> Self {
        if let Self::Config { path, .. } = &mut self {
            *path = Some(file.into());
        }
        self
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Spawn { source: src, .. }
            | Self::ProcessIo { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::Parse { .. } | Self::CacheState { .. } | Self::NotFound { .. } => {}
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Spawn { message, .. }
            | Self::ProcessIo { message, .. }
            | Self::Parse { message, .. }
            | Self::CacheState { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
            Self::NotFound { .. } => {}
        }
        self
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Spawn { .. } => 3,
            Self::ProcessIo { .. } => 4,
            Self::Parse { .. } => 5,
            Self::CacheState { .. } => 6,
            Self::NotFound { .. } => 7,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Spawn { code, .. }
            | Self::ProcessIo { code, .. }
            | Self::Parse { code, .. }
            | Self::CacheState { code, .. }
            | Self::NotFound { code, .. } => *code,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, path, .. } => match path {
                Some(p) => format!("Configuration problem in {}: {}", p.display(), message),
                None => format!("Configuration problem: {}", message),
            },
            Self::Spawn {
                message, command, ..
            } => match command {
                Some(cmd) => format!("Could not start '{}': {}", cmd, message),
                None => format!("Could not start coverage tool: {}", message),
            },
            Self::ProcessIo {
                message, command, ..
            } => match command {
                Some(cmd) => format!("Communication with '{}' failed: {}", cmd, message),
                None => format!("Communication with coverage tool failed: {}", message),
            },
            Self::Parse { message, line, .. } => format!("Skipped line '{}': {}", line, message),
            Self::CacheState { message, path, .. } => {
                format!("Coverage tree inconsistent at {}: {}", path.display(), message)
            }
            Self::NotFound { path, .. } => {
                format!("No coverage information for {}", path.display())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CovtreeError>;
