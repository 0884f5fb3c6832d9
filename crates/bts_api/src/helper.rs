//! Transport that delegates every REST call to an external helper program.
//!
//! The helper prints JSON on stdout. Exit code `0` means success, `2` means a
//! tracker-reported error with a `{"message": ...}` payload on stdout, anything else
//! is an opaque failure described by stderr.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{HelperCommand, TrackerConfig, TransportKind};
use crate::error::{Result, TrackerError};
use crate::models::{CommentListing, FetchedFields, IssuePayload, RawComment, Transition, TransitionListing};
use crate::normalize;
use crate::transport::Transport;

/// Runs the helper once per operation and waits for it to exit before reading its output.
#[derive(Clone, Debug)]
pub struct HelperProcess {
    command: HelperCommand,
    base_url: Option<String>,
    timeout: Duration,
}

impl HelperProcess {
    pub fn new(command: HelperCommand, config: &TrackerConfig) -> Self {
        Self {
            command,
            base_url: config.base_url.clone(),
            timeout: config.timeout,
        }
    }

    /// Builds the helper transport from a configuration whose transport kind is `Process`.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        match &config.transport {
            TransportKind::Process(command) => Ok(Self::new(command.clone(), config)),
            TransportKind::Http => Err(TrackerError::Configuration(
                "tracker is not configured to use a helper process".to_string(),
            )),
        }
    }

    fn global_args(&self) -> Result<Vec<OsString>> {
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(TrackerError::not_configured)?;
        let mut args: Vec<OsString> = vec!["--api-url".into(), base_url.into()];
        if let Some(path) = &self.command.credentials_file {
            args.push("--credentials".into());
            args.push(path.into());
        }
        if let Some(path) = &self.command.custom_fields_file {
            args.push("--custom-fields".into());
            args.push(path.into());
        }
        Ok(args)
    }

    /// Runs the helper with the operation arguments and returns its stdout.
    ///
    /// `key` is set for operations on the issue itself, so a 404 error document maps
    /// to an unknown key; comment and transition operations pass `None`.
    async fn invoke(&self, key: Option<&str>, operation: Vec<OsString>) -> Result<String> {
        let mut command = match &self.command.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.command.helper);
                command
            }
            None => Command::new(&self.command.helper),
        };
        command
            .args(self.global_args()?)
            .args(&operation)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("running helper {} with {operation:?}", self.command.helper.display());
        let output = match timeout(self.timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TrackerError::Timeout(format!(
                    "helper {} did not finish within {:?}",
                    self.command.helper.display(),
                    self.timeout
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            if !stderr.trim().is_empty() {
                debug!("helper diagnostics: {}", stderr.trim());
            }
            Ok(stdout)
        } else {
            warn!("helper exited with {}", output.status);
            Err(normalize::process_failure(
                key,
                output.status.code(),
                &stdout,
                &stderr,
            ))
        }
    }

    async fn invoke_json<T>(&self, issue: Option<&str>, operation: Vec<OsString>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let stdout = self.invoke(issue, operation).await?;
        serde_json::from_str(stdout.trim()).map_err(TrackerError::from)
    }

    async fn invoke_unit(&self, issue: Option<&str>, operation: Vec<OsString>) -> Result<()> {
        self.invoke(issue, operation).await.map(|_| ())
    }
}

fn op(flag: &str, values: &[&str]) -> Vec<OsString> {
    std::iter::once(flag)
        .chain(values.iter().copied())
        .map(OsString::from)
        .collect()
}

/// One `--get-issue` output line: an issue payload, a `{"message", "status"}` error
/// document, or a bare error message string.
fn parse_issue_line(key: &str, line: Option<&str>) -> Result<FetchedFields> {
    let line = match line.map(str::trim) {
        Some(line) if !line.is_empty() => line,
        _ => {
            return Err(TrackerError::transport(format!(
                "helper returned no result for {key}"
            )))
        }
    };
    match serde_json::from_str::<Value>(line)? {
        Value::String(message) => Err(TrackerError::transport(message)),
        Value::Null => Err(TrackerError::transport(format!(
            "helper returned no result for {key}"
        ))),
        document if document.get("message").is_some() && !is_issue_payload(&document) => {
            Err(normalize::helper_error(Some(key), &document).unwrap_or_else(|| {
                TrackerError::transport(format!("helper returned an unreadable error for {key}"))
            }))
        }
        other => serde_json::from_value::<IssuePayload>(other)?.into_fetched(),
    }
}

fn is_issue_payload(document: &Value) -> bool {
    document.get("fields").is_some() || document.get("errors").is_some()
}

/// Copies a failure that applies to every key of one helper invocation.
fn duplicate_error(err: &TrackerError) -> TrackerError {
    match err {
        TrackerError::Configuration(message) => TrackerError::Configuration(message.clone()),
        TrackerError::Timeout(message) => TrackerError::Timeout(message.clone()),
        TrackerError::ProcessFailure { code, stderr } => TrackerError::ProcessFailure {
            code: *code,
            stderr: stderr.clone(),
        },
        TrackerError::Transport {
            status,
            message,
            body,
        } => TrackerError::Transport {
            status: *status,
            message: message.clone(),
            body: body.clone(),
        },
        other => TrackerError::transport(other.to_string()),
    }
}

#[async_trait]
impl Transport for HelperProcess {
    async fn fetch_fields(&self, key: &str, native_names: &[String]) -> Result<FetchedFields> {
        if native_names.is_empty() {
            return Ok(FetchedFields::Fields(Map::new()));
        }
        let mut operation = Vec::with_capacity(native_names.len() * 3);
        for name in native_names {
            operation.extend(op("--get-field", &[key, name.as_str()]));
        }
        let stdout = self.invoke(Some(key), operation).await?;
        let mut lines = stdout.lines();
        let mut fields = Map::new();
        for name in native_names {
            let line = lines.next().ok_or_else(|| {
                TrackerError::transport(format!("helper returned no value for {key} field {name}"))
            })?;
            fields.insert(name.clone(), serde_json::from_str(line.trim())?);
        }
        Ok(FetchedFields::Fields(fields))
    }

    /// One invocation for all keys; output lines are matched to keys by position.
    async fn fetch_issues(&self, keys: &[String], _native_names: &[String]) -> Vec<Result<FetchedFields>> {
        if keys.is_empty() {
            return Vec::new();
        }
        let mut operation = Vec::with_capacity(keys.len() * 2);
        for key in keys {
            operation.extend(op("--get-issue", &[key.as_str()]));
        }
        match self.invoke(None, operation).await {
            Ok(stdout) => {
                let mut lines = stdout.lines();
                keys.iter()
                    .map(|key| parse_issue_line(key, lines.next()))
                    .collect()
            }
            Err(err) => keys.iter().map(|_| Err(duplicate_error(&err))).collect(),
        }
    }

    async fn write_fields(&self, key: &str, fields: &Map<String, Value>) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut operation = Vec::with_capacity(fields.len() * 4);
        for (name, value) in fields {
            let encoded = serde_json::to_string(value)?;
            operation.extend(op("--set-field", &[key, name.as_str(), encoded.as_str()]));
        }
        self.invoke_unit(Some(key), operation).await
    }

    async fn post_comment(&self, key: &str, body: &str) -> Result<()> {
        self.invoke_unit(None, op("--add-comment", &[key, body])).await
    }

    async fn list_comments(&self, key: &str) -> Result<Vec<RawComment>> {
        let listing: CommentListing = self.invoke_json(None, op("--get-comments", &[key])).await?;
        Ok(listing.into_vec())
    }

    async fn delete_comment(&self, key: &str, id: &str) -> Result<()> {
        self.invoke_unit(None, op("--delete-comment", &[key, id])).await
    }

    async fn get_transitions(&self, key: &str) -> Result<Vec<Transition>> {
        let listing: TransitionListing = self.invoke_json(None, op("--get-transitions", &[key])).await?;
        Ok(listing.into_vec())
    }

    async fn apply_transition(&self, key: &str, transition_id: &str) -> Result<()> {
        self.invoke_unit(None, op("--apply-transition", &[key, transition_id]))
            .await
    }
}
