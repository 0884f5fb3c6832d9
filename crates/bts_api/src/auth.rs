//! Tracker credentials and how they are attached to outgoing requests.

use std::fmt;
use std::fs;
use std::path::Path;

use reqwest::RequestBuilder;
use serde::Deserialize;

use crate::error::{Result, TrackerError};

/// Username/password pair used for HTTP basic authentication.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads a `{"username": ..., "password": ...}` JSON document.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            TrackerError::Configuration(format!(
                "cannot read credentials {}: {err}",
                path.display()
            ))
        })?;
        serde_json::from_str(&content).map_err(|err| {
            TrackerError::Configuration(format!("invalid credentials {}: {err}", path.display()))
        })
    }

    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
