//! Folds tracker error bodies and helper process failures into [`TrackerError`].

use serde::Deserialize;
use serde_json::Value;

use crate::error::TrackerError;

/// Exit code the helper uses for tracker-reported errors with a `{message}` payload.
pub const HELPER_APPLICATION_ERROR: i32 = 2;

/// Jira-style validation payload: `{"errorMessages": [...], "errors": {field: ...}}`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TrackerErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
    #[serde(default)]
    errors: serde_json::Map<String, Value>,
}

/// Payload the helper prints on stdout when it exits with [`HELPER_APPLICATION_ERROR`].
#[derive(Debug, Deserialize)]
struct HelperErrorPayload {
    message: String,
    #[serde(default)]
    status: Option<u16>,
}

/// Joins every message of a tracker error body with newlines.
///
/// Returns `None` when the body is not a tracker error document or carries
/// no messages at all.
pub fn tracker_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<TrackerErrorBody>(body).ok()?;
    let mut messages = parsed.error_messages;
    for value in parsed.errors.values() {
        match value {
            Value::String(text) => messages.push(text.clone()),
            Value::Array(items) => messages.extend(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string)),
            ),
            Value::Null => {}
            other => messages.push(other.to_string()),
        }
    }
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("\n"))
    }
}

/// Builds the error for a non-2xx HTTP answer.
///
/// `issue` is set only for requests on the issue resource itself; a 404 there is
/// an unknown key, anywhere else it stays a transport failure.
pub fn http_failure(issue: Option<&str>, status: u16, reason: &str, body: &str) -> TrackerError {
    let message = tracker_message(body).unwrap_or_else(|| {
        if reason.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status} {reason}")
        }
    });
    match issue {
        Some(key) if status == 404 => TrackerError::InvalidKey {
            key: key.to_string(),
            message,
        },
        _ => TrackerError::Transport {
            status: Some(status),
            message,
            body: Some(body.to_string()),
        },
    }
}

/// Builds the error a helper `{"message", "status"}` document describes.
///
/// `issue` is set when the document answers a request on the issue itself; a 404
/// status then means the key is unknown. Returns `None` for any other document.
pub fn helper_error(issue: Option<&str>, document: &Value) -> Option<TrackerError> {
    let payload = HelperErrorPayload::deserialize(document).ok()?;
    Some(match (issue, payload.status) {
        (Some(key), Some(404)) => TrackerError::InvalidKey {
            key: key.to_string(),
            message: payload.message,
        },
        (_, status) => TrackerError::Transport {
            status,
            message: payload.message,
            body: None,
        },
    })
}

/// Builds the error for a helper invocation that exited with a non-zero code.
pub fn process_failure(issue: Option<&str>, code: Option<i32>, stdout: &str, stderr: &str) -> TrackerError {
    if code == Some(HELPER_APPLICATION_ERROR) {
        let structured = serde_json::from_str::<Value>(stdout.trim())
            .ok()
            .and_then(|document| helper_error(issue, &document));
        if let Some(err) = structured {
            return err;
        }
    }
    TrackerError::ProcessFailure {
        code,
        stderr: stderr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_error_messages_then_field_errors() {
        let body = r#"{"errorMessages":["X"],"errors":{"field":["Y"]}}"#;
        assert_eq!(tracker_message(body).as_deref(), Some("X\nY"));
    }

    #[test]
    fn accepts_plain_string_field_errors() {
        let body = r#"{"errorMessages":[],"errors":{"summary":"Summary is required"}}"#;
        assert_eq!(tracker_message(body).as_deref(), Some("Summary is required"));
    }

    #[test]
    fn unparseable_body_falls_back_to_transport_message() {
        let err = http_failure(None, 502, "Bad Gateway", "<html>proxy</html>");
        match err {
            TrackerError::Transport { status, message, body } => {
                assert_eq!(status, Some(502));
                assert_eq!(message, "HTTP 502 Bad Gateway");
                assert_eq!(body.as_deref(), Some("<html>proxy</html>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_issue_becomes_invalid_key() {
        let body = r#"{"errorMessages":["Issue Does Not Exist"],"errors":{}}"#;
        let err = http_failure(Some("BAD-2"), 404, "Not Found", body);
        assert!(matches!(
            err,
            TrackerError::InvalidKey { ref key, ref message }
                if key == "BAD-2" && message == "Issue Does Not Exist"
        ));
    }

    #[test]
    fn missing_sub_resource_keeps_the_status() {
        let body = r#"{"errorMessages":["Can not find a comment for the id: 999."]}"#;
        let err = http_failure(None, 404, "Not Found", body);
        assert!(matches!(err, TrackerError::Transport { status: Some(404), .. }));
        assert_eq!(err.to_string(), "Can not find a comment for the id: 999.");
    }

    #[test]
    fn helper_documents_map_like_http_answers() {
        let document = serde_json::json!({"message": "Issue Does Not Exist", "status": 404});
        let on_issue = helper_error(Some("BAD-2"), &document).unwrap();
        assert_eq!(on_issue.to_string(), "invalid issue key BAD-2: Issue Does Not Exist");

        let on_comment = helper_error(None, &document).unwrap();
        assert!(matches!(on_comment, TrackerError::Transport { status: Some(404), .. }));

        assert!(helper_error(Some("A-1"), &serde_json::json!({"fields": {}})).is_none());
    }

    #[test]
    fn helper_exit_two_uses_structured_message() {
        let err = process_failure(Some("A-1"), Some(2), "{\"message\": \"Field 'x' cannot be set\"}\n", "");
        assert_eq!(err.to_string(), "Field 'x' cannot be set");
    }

    #[test]
    fn helper_other_exit_keeps_stderr_verbatim() {
        let err = process_failure(Some("A-1"), Some(1), "", "connection refused\n");
        assert!(matches!(err, TrackerError::ProcessFailure { code: Some(1), .. }));
        assert_eq!(err.to_string(), "connection refused\n");
    }

    #[test]
    fn helper_exit_two_without_payload_is_opaque() {
        let err = process_failure(None, Some(2), "garbage", "usage: bts-helper");
        assert_eq!(err.to_string(), "usage: bts-helper");
    }
}
