//! Error types for the closure runner
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Transport errors (3xx)
    HttpFailed = 300,
    TlsError = 304,

    // Coordinator protocol errors (4xx)
    ReportRejected = 400,
    ProtocolMalformed = 401,
    SourceFetch = 410,
    SourceArchive = 411,
    InvalidEntrypoint = 420,

    // Execution errors (5xx)
    ExecutionFailed = 500,
    InterpreterSpawn = 501,
    OutputRead = 502,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Exit code used by the `config` subcommands
    ///
    /// `run` never uses it: every failure there exits with 1.
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the runner
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────

    /// Underlying HTTP transport failure (connect, TLS, body read)
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The custom trust bundle could not be turned into a client
    #[error("Failed to load trust bundle {path}: {message}")]
    TrustBundle { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────
    // Coordinator Errors
    // ─────────────────────────────────────────────────────────────

    /// Coordinator answered a GET or PATCH with a non-success status
    #[error("{method} {url} returned {status}")]
    Report {
        method: String,
        url: String,
        status: u16,
    },

    /// Coordinator payload did not match the expected shape
    #[error("Malformed coordinator response from {url}: {message}")]
    Malformed { url: String, message: String },

    /// Closure source download answered with a non-success status
    #[error("Unable to fetch script source from {url}: HTTP {status}")]
    SourceFetch { url: String, status: u16 },

    /// Downloaded source archive could not be unpacked
    #[error("Failed to unpack source archive from {url}: {message}")]
    SourceArchive { url: String, message: String },

    /// Entry point string is not of the form `module.handler`
    #[error("Invalid entrypoint '{entrypoint}': expected <module>.<handler>")]
    InvalidEntrypoint { entrypoint: String },

    // ─────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────

    /// Interpreter wrote to stderr
    #[error("{stderr}")]
    ExecutionFailed { stderr: String },

    /// Interpreter process could not be started
    #[error("Failed to start interpreter {program}: {source}")]
    InterpreterSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Result file could not be decoded
    #[error("Failed to read closure outputs from {path}: {message}")]
    OutputRead { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::Http { .. } => ErrorCode::HttpFailed,
            Error::TrustBundle { .. } => ErrorCode::TlsError,

            Error::Report { .. } => ErrorCode::ReportRejected,
            Error::Malformed { .. } => ErrorCode::ProtocolMalformed,
            Error::SourceFetch { .. } => ErrorCode::SourceFetch,
            Error::SourceArchive { .. } => ErrorCode::SourceArchive,
            Error::InvalidEntrypoint { .. } => ErrorCode::InvalidEntrypoint,

            Error::ExecutionFailed { .. } => ErrorCode::ExecutionFailed,
            Error::InterpreterSpawn { .. } => ErrorCode::InterpreterSpawn,
            Error::OutputRead { .. } => ErrorCode::OutputRead,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'closure-runner config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'closure-runner config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration values and the TASK_URI environment variable."
            ),
            Error::Http { .. } => Some(
                "Check that the coordinator is reachable from this container."
            ),
            Error::TrustBundle { .. } => Some(
                "The trust bundle must contain PEM encoded certificates."
            ),
            Error::Report { status: 401 | 403, .. } => Some(
                "The coordinator rejected the auth token. Check the TOKEN environment variable."
            ),
            Error::InvalidEntrypoint { .. } => Some(
                "Set the closure entrypoint to '<module>.<handler>' or leave it empty."
            ),
            Error::InterpreterSpawn { .. } => Some(
                "Check the [runner] interpreter setting and that the interpreter is installed."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Wrap a reqwest failure for the given URL
    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Error::Http {
            url: url.into(),
            source,
        }
    }

    /// Create a rejected-status error for a coordinator call
    pub fn report(method: &reqwest::Method, url: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Error::Report {
            method: method.to_string(),
            url: url.into(),
            status: status.as_u16(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
