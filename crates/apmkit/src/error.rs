//! Error types for apm operations.
//!
//! Errors are categorized so callers can tell rejected input apart from a
//! missing `apm` executable or a failing `apm` command. The `Display` text of
//! each variant is the message reported back to the host runtime.

use thiserror::Error;

/// Categories of apm errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Request rejected before any external call was made
    Input,
    /// The `apm` executable could not be resolved
    ToolNotFound,
    /// An `apm` invocation failed or did not reach its post-condition
    Command,
    /// IO or serialization failure
    Io,
}

impl ErrorCategory {
    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Input => "Package names may only contain letters, digits, underscores and dashes",
            Self::ToolNotFound => "Install Atom's shell commands or pass the directory holding apm via --path",
            Self::Command => "Run the same apm command by hand to see its full output",
            Self::Io => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during apm operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Package name outside the accepted character class
    #[error("Invalid package: {0}.")]
    InvalidPackage(String),

    /// Search path outside the accepted character class
    #[error("Invalid path: {0}.")]
    InvalidPath(String),

    /// Resolved apm executable path outside the accepted character class
    #[error("Invalid apm_path: {0}.")]
    InvalidApmPath(String),

    /// Unknown desired state
    #[error("Invalid state: {0}.")]
    InvalidState(String),

    /// apm is not on the search path nor on `$PATH`
    #[error("Unable to locate Atom package manager (apm) executable.")]
    ApmNotFound,

    /// An apm command exited unsuccessfully or left the package in the wrong state
    #[error("{message}")]
    CommandFailed {
        /// The apm arguments that were run
        command: String,
        /// Trimmed standard error, or a fallback when apm printed nothing
        message: String,
    },

    /// The apm process could not be spawned
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidPackage(_)
            | Error::InvalidPath(_)
            | Error::InvalidApmPath(_)
            | Error::InvalidState(_) => ErrorCategory::Input,
            Error::ApmNotFound => ErrorCategory::ToolNotFound,
            Error::CommandFailed { .. } | Error::Spawn { .. } => ErrorCategory::Command,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Create an error from the stderr of an apm command.
    ///
    /// apm's own stderr is the most useful message, so it is surfaced as-is.
    /// An empty stderr falls back to naming the command and exit code.
    pub fn from_apm_output(args: &[&str], stderr: &str, code: Option<i32>) -> Self {
        let command = args.join(" ");
        let trimmed = stderr.trim();
        let message = if trimmed.is_empty() {
            match code {
                Some(code) => format!("apm {command} exited with status {code}"),
                None => format!("apm {command} was terminated by a signal"),
            }
        } else {
            trimmed.to_string()
        };
        Error::CommandFailed { command, message }
    }
}

/// Result type for apm operations.
pub type Result<T> = std::result::Result<T, Error>;
