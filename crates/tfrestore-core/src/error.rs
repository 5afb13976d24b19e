//! Restore pipeline error types

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Boxed error carried as the cause of a [`RestoreError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Credential resolution errors
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Secret {secret} is missing required key '{key}'")]
    MissingKey { secret: String, key: String },

    #[error("Secret backend failed: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from decoding provider configuration or a persisted state blob
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Could not parse provider config: {0}")]
    Syntax(String),

    #[error("Unsupported provider config type: {api_version}/{kind}")]
    UnsupportedType { api_version: String, kind: String },

    #[error("Invalid provider config: {0}")]
    Invalid(String),

    #[error("Malformed state: {0}")]
    MalformedState(String),
}

/// Template rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Chart not found: {0}")]
    ChartNotFound(PathBuf),

    #[error("Rendered chart '{chart}' is missing required file '{file}'")]
    MissingFile { chart: String, file: String },

    #[error("Template error in {file}: {message}")]
    Template { file: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Provisioning engine errors
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Provisioning engine not found: {0}")]
    EngineNotFound(String),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Apply timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Invalid engine output: {0}")]
    InvalidOutput(String),

    #[error("Engine returned no state after a successful apply")]
    StateLost,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors mapping engine outputs onto the provider status
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Required output '{0}' is missing")]
    MissingOutput(String),

    #[error("Output '{key}' is invalid: {message}")]
    InvalidOutput { key: String, message: String },
}

/// Classification of a failed restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Credential,
    Decode,
    Render,
    Apply,
    StatusExtraction,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Credential => write!(f, "credential"),
            ErrorKind::Decode => write!(f, "decode"),
            ErrorKind::Render => write!(f, "render"),
            ErrorKind::Apply => write!(f, "apply"),
            ErrorKind::StatusExtraction => write!(f, "status extraction"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Error returned by the restore pipeline
///
/// `RetryAfter` asks the caller to run the whole pipeline again once `after`
/// has elapsed. `Fatal` will not resolve by waiting.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("restore failed ({kind}): {source}")]
    Fatal {
        kind: ErrorKind,
        #[source]
        source: BoxError,
    },

    #[error("restore failed, retry after {}s: {source}", .after.as_secs())]
    RetryAfter {
        after: Duration,
        #[source]
        source: BoxError,
    },
}

impl RestoreError {
    pub fn fatal(kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        Self::Fatal {
            kind,
            source: source.into(),
        }
    }

    pub fn retry_after(after: Duration, source: impl Into<BoxError>) -> Self {
        Self::RetryAfter {
            after,
            source: source.into(),
        }
    }

    /// Error kind; retry-hinted errors always originate from the apply step
    pub fn kind(&self) -> ErrorKind {
        match self {
            RestoreError::Fatal { kind, .. } => *kind,
            RestoreError::RetryAfter { .. } => ErrorKind::Apply,
        }
    }

    pub fn retry_after_hint(&self) -> Option<Duration> {
        match self {
            RestoreError::RetryAfter { after, .. } => Some(*after),
            RestoreError::Fatal { .. } => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RestoreError::RetryAfter { .. })
    }

    /// The error that caused the pipeline to stop
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        match self {
            RestoreError::Fatal { source, .. } | RestoreError::RetryAfter { source, .. } => {
                source.as_ref()
            }
        }
    }
}

/// Raised when the caller cancels a restore in flight
#[derive(Error, Debug)]
#[error("restore of {0} was cancelled")]
pub struct Cancelled(pub String);
