use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, TrackerError};

/// Raw field data for one issue, or the tracker's rejection of the lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedFields {
    /// Field values keyed by tracker-native field name.
    Fields(Map<String, Value>),
    /// The tracker answered with `errors: true`; carries its `error_msg`.
    Rejected(String),
}

/// Body of `GET issue/{key}`.
#[derive(Debug, Deserialize)]
pub struct IssuePayload {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
    #[serde(default)]
    pub errors: Option<Value>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

impl IssuePayload {
    pub fn into_fetched(self) -> Result<FetchedFields> {
        if self.errors == Some(Value::Bool(true)) {
            let message = self
                .error_msg
                .unwrap_or_else(|| "issue rejected by tracker".to_string());
            return Ok(FetchedFields::Rejected(message));
        }
        match self.fields {
            Some(fields) => Ok(FetchedFields::Fields(fields)),
            None => Err(TrackerError::transport("Unexpected response from tracker")),
        }
    }
}
