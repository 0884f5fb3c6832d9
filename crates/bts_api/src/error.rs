//! Error model shared by every tracker operation.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Every failure surfaced by the synchronization layer, whichever transport produced it.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{0}")]
    Configuration(String),
    #[error("invalid issue key {key}: {message}")]
    InvalidKey { key: String, message: String },
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("no transition from the current state of {key} leads to {status:?}")]
    TransitionNotFound { key: String, status: String },
    #[error("{}", process_failure_message(.code, .stderr))]
    ProcessFailure { code: Option<i32>, stderr: String },
    #[error("issue {key} is invalid: {message}")]
    InvalidIssue { key: String, message: String },
    #[error("malformed value for field {field}: {message}")]
    MalformedField { field: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl TrackerError {
    /// Transport failure without an HTTP status or raw body.
    pub fn transport(message: impl Into<String>) -> Self {
        TrackerError::Transport {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    pub fn not_configured() -> Self {
        TrackerError::Configuration(
            "Tracker support not configured (no tracker API URL set)".to_string(),
        )
    }

    /// HTTP status attached to the failure, when the tracker answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TrackerError::Transport { status, .. } => *status,
            TrackerError::InvalidKey { .. } => Some(404),
            _ => None,
        }
    }

    /// True for failures the tracker itself reported (4xx answers).
    pub fn is_tracker_reported(&self) -> bool {
        matches!(self.status(), Some(code) if (400..500).contains(&code))
    }
}

fn process_failure_message(code: &Option<i32>, stderr: &str) -> String {
    if !stderr.trim().is_empty() {
        return stderr.to_string();
    }
    match *code {
        Some(code) => format!("helper process exited with status {code}"),
        None => "helper process terminated by signal".to_string(),
    }
}

impl From<reqwest::Error> for TrackerError {
    /// Converts reqwest errors into timeouts or transport failures.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::Timeout(err.to_string())
        } else {
            TrackerError::Transport {
                status: err.status().map(|status| status.as_u16()),
                message: err.to_string(),
                body: None,
            }
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    /// A body that is not the JSON we expected is a transport failure.
    fn from(err: serde_json::Error) -> Self {
        TrackerError::transport(format!("malformed response: {err}"))
    }
}
