//! Issues: a frozen snapshot of essential fields plus live field, comment and status operations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, TrackerError};
use crate::fields::{normalize_fields, parse_timestamp, FieldSet, FieldValue, ReverseMap};
use crate::models::{FetchedFields, RawComment};
use crate::tracker::TrackerInner;
use crate::user::{resolve_user, UserRef};

/// Point-in-time read of an issue's essential fields, taken at construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IssueSnapshot {
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub priority: Option<String>,
    pub reporter: Option<UserRef>,
    pub assignee: Option<UserRef>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Custom and any other returned fields, by canonical name.
    pub custom: BTreeMap<String, Value>,
}

impl IssueSnapshot {
    fn from_fields(fields: FieldSet) -> Self {
        let mut snapshot = IssueSnapshot::default();
        for (name, value) in fields {
            match (name.as_str(), value) {
                ("created", value) => snapshot.created = value.as_timestamp(),
                ("updated", value) => snapshot.updated = value.as_timestamp(),
                ("status", FieldValue::Name(name)) => snapshot.status = Some(name),
                ("resolution", FieldValue::Name(name)) => snapshot.resolution = Some(name),
                ("priority", FieldValue::Name(name)) => snapshot.priority = Some(name),
                ("reporter", FieldValue::User(user)) => snapshot.reporter = Some(user),
                ("assignee", FieldValue::User(user)) => snapshot.assignee = Some(user),
                ("summary", FieldValue::Json(value)) => snapshot.summary = text(value),
                ("description", FieldValue::Json(value)) => snapshot.description = text(value),
                (_, FieldValue::Json(value)) => {
                    snapshot.custom.insert(name.clone(), value);
                }
                _ => {}
            }
        }
        snapshot
    }
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Tracker-assigned comment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommentId(String);

impl CommentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(id: &str) -> Self {
        CommentId(id.to_string())
    }
}

impl From<String> for CommentId {
    fn from(id: String) -> Self {
        CommentId(id)
    }
}

impl From<u64> for CommentId {
    fn from(id: u64) -> Self {
        CommentId(id.to_string())
    }
}

impl From<&IssueComment> for CommentId {
    fn from(comment: &IssueComment) -> Self {
        comment.id.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueComment {
    pub id: CommentId,
    pub author: Option<UserRef>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub body: String,
}

/// Result of a status change request that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// The issue already had the requested status; nothing was sent.
    Unchanged,
    /// The named transition was applied.
    Transitioned { transition_id: String },
    /// No transition from the current state leads to the requested status.
    NotReachable,
}

impl StatusChange {
    /// True when the issue now has the requested status.
    pub fn reached(&self) -> bool {
        !matches!(self, StatusChange::NotReachable)
    }
}

#[derive(Debug, Clone)]
enum IssueState {
    Valid(Arc<IssueSnapshot>),
    Invalid(String),
}

/// One issue of the tracker.
///
/// Construction captures the essential fields once; every other read goes back to the
/// tracker. An issue the tracker rejected at construction is kept as an invalid issue
/// that only exposes its key and the rejection message.
#[derive(Clone)]
pub struct Issue {
    key: String,
    state: IssueState,
    tracker: Arc<TrackerInner>,
}

impl fmt::Debug for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issue")
            .field("key", &self.key)
            .field("state", &self.state)
            .finish()
    }
}

impl Issue {
    pub(crate) fn from_fetched(
        tracker: Arc<TrackerInner>,
        key: String,
        fetched: FetchedFields,
        reverse: &ReverseMap,
    ) -> Result<Self> {
        let state = match fetched {
            FetchedFields::Fields(raw) => {
                let fields = normalize_fields(raw, reverse, tracker.resolver.as_ref())?;
                IssueState::Valid(Arc::new(IssueSnapshot::from_fields(fields)))
            }
            FetchedFields::Rejected(message) => {
                debug!("issue {key} rejected by tracker: {message}");
                IssueState::Invalid(message)
            }
        };
        Ok(Self {
            key,
            state,
            tracker,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, IssueState::Valid(_))
    }

    /// Why the tracker rejected this issue, for invalid issues.
    pub fn invalid_reason(&self) -> Option<&str> {
        match &self.state {
            IssueState::Invalid(message) => Some(message),
            IssueState::Valid(_) => None,
        }
    }

    /// Essential fields as captured at construction.
    pub fn snapshot(&self) -> Result<&IssueSnapshot> {
        match &self.state {
            IssueState::Valid(snapshot) => Ok(snapshot.as_ref()),
            IssueState::Invalid(message) => Err(self.invalid(message)),
        }
    }

    fn invalid(&self, message: &str) -> TrackerError {
        TrackerError::InvalidIssue {
            key: self.key.clone(),
            message: message.to_string(),
        }
    }

    fn ensure_valid(&self) -> Result<()> {
        self.snapshot().map(|_| ())
    }

    /// Re-reads a single field from the tracker; absent fields read as `Null`.
    pub async fn get_field(&self, name: &str) -> Result<FieldValue> {
        let mut fields = self.get_fields(&[name]).await?;
        Ok(fields.remove(name).unwrap_or(FieldValue::Null))
    }

    /// Re-reads the named fields from the tracker.
    pub async fn get_fields<S: AsRef<str>>(&self, names: &[S]) -> Result<FieldSet> {
        self.ensure_valid()?;
        let (natives, reverse) = self.tracker.config.field_map.to_native_names(names);
        match self.tracker.transport.fetch_fields(&self.key, &natives).await? {
            FetchedFields::Fields(raw) => normalize_fields(raw, &reverse, self.tracker.resolver.as_ref()),
            FetchedFields::Rejected(message) => Err(self.invalid(&message)),
        }
    }

    pub async fn set_field(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.set_fields([(name, value.into())]).await
    }

    /// Writes all fields in one tracker call; it succeeds or fails as a whole.
    pub async fn set_fields<I, K>(&self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.ensure_valid()?;
        let payload = self.tracker.config.field_map.denormalize_fields(fields);
        if payload.is_empty() {
            return Ok(());
        }
        self.tracker.transport.write_fields(&self.key, &payload).await
    }

    pub async fn add_comment(&self, text: &str) -> Result<()> {
        self.ensure_valid()?;
        self.tracker.transport.post_comment(&self.key, text).await
    }

    /// Comments in tracker order, with authors resolved against the caller's users.
    pub async fn get_comments(&self) -> Result<Vec<IssueComment>> {
        self.ensure_valid()?;
        let raw = self.tracker.transport.list_comments(&self.key).await?;
        raw.into_iter()
            .map(|comment| self.parse_comment(comment))
            .collect()
    }

    fn parse_comment(&self, raw: RawComment) -> Result<IssueComment> {
        let id = raw.id.ok_or_else(|| TrackerError::MalformedField {
            field: "comment".to_string(),
            message: format!("comment on {} without an id", self.key),
        })?;
        let timestamp = |value: Option<String>| value.map(|text| parse_timestamp(&Value::String(text))).transpose();
        Ok(IssueComment {
            id: CommentId(id),
            author: resolve_user(&raw.author, self.tracker.resolver.as_ref()),
            created: timestamp(raw.created)?,
            updated: timestamp(raw.updated)?,
            body: raw.body.unwrap_or_default(),
        })
    }

    /// Deletes a comment, given either the comment itself or its id.
    pub async fn delete_comment(&self, comment: impl Into<CommentId>) -> Result<()> {
        self.ensure_valid()?;
        let id = comment.into();
        self.tracker.transport.delete_comment(&self.key, id.as_str()).await
    }

    /// Current status name, read with a single-field fetch.
    pub async fn get_status(&self) -> Result<Option<String>> {
        let value = self.get_field("status").await?;
        Ok(value.as_name().map(str::to_string))
    }

    /// Moves the issue to `target` through the first matching workflow transition.
    ///
    /// Only one hop is attempted. Applying a transition is not idempotent, so it is
    /// never retried here.
    pub async fn set_status(&self, target: &str) -> Result<StatusChange> {
        self.ensure_valid()?;

        match self.get_status().await {
            Ok(Some(current)) if current == target => {
                debug!("{} already has status {target:?}", self.key);
                return Ok(StatusChange::Unchanged);
            }
            Ok(_) => {}
            Err(err) => debug!(
                "could not read current status of {}, trying transitions anyway: {err}",
                self.key
            ),
        }

        let transitions = self.tracker.transport.get_transitions(&self.key).await?;
        let chosen = transitions.iter().find_map(|transition| {
            let id = transition.id.as_deref()?;
            (transition.target_name()? == target).then_some(id)
        });

        match chosen {
            Some(id) => {
                info!("moving {} to {target:?} via transition {id}", self.key);
                self.tracker.transport.apply_transition(&self.key, id).await?;
                Ok(StatusChange::Transitioned {
                    transition_id: id.to_string(),
                })
            }
            None => {
                debug!(
                    "{} has no transition to {target:?} among {} offered",
                    self.key,
                    transitions.len()
                );
                Ok(StatusChange::NotReachable)
            }
        }
    }

    /// Like [`Issue::set_status`], but an unreachable status is an error.
    pub async fn require_status(&self, target: &str) -> Result<StatusChange> {
        match self.set_status(target).await? {
            StatusChange::NotReachable => Err(TrackerError::TransitionNotFound {
                key: self.key.clone(),
                status: target.to_string(),
            }),
            change => Ok(change),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Map};

    use super::*;
    use crate::config::TrackerConfig;
    use crate::fields::FieldMap;
    use crate::models::Transition;
    use crate::tracker::Tracker;
    use crate::transport::Transport;
    use crate::user::NoUserDirectory;

    /// In-memory transport that records every call.
    #[derive(Default)]
    struct FakeTransport {
        fields: Mutex<Map<String, Value>>,
        transitions: Vec<Transition>,
        status_fails: bool,
        rejected: Option<String>,
        comments: Vec<RawComment>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn fetch_fields(&self, key: &str, native_names: &[String]) -> Result<FetchedFields> {
            self.record(format!("fetch {key} {}", native_names.join(",")));
            if let Some(message) = &self.rejected {
                return Ok(FetchedFields::Rejected(message.clone()));
            }
            if self.status_fails && native_names == ["status"] {
                return Err(TrackerError::transport("status unavailable"));
            }
            let fields = self.fields.lock().unwrap();
            Ok(FetchedFields::Fields(
                native_names
                    .iter()
                    .filter_map(|name| fields.get(name).map(|value| (name.clone(), value.clone())))
                    .collect(),
            ))
        }

        async fn write_fields(&self, key: &str, fields: &Map<String, Value>) -> Result<()> {
            self.record(format!("write {key} {}", Value::Object(fields.clone())));
            Ok(())
        }

        async fn post_comment(&self, key: &str, body: &str) -> Result<()> {
            self.record(format!("comment {key} {body}"));
            Ok(())
        }

        async fn list_comments(&self, key: &str) -> Result<Vec<RawComment>> {
            self.record(format!("comments {key}"));
            Ok(self.comments.clone())
        }

        async fn delete_comment(&self, key: &str, id: &str) -> Result<()> {
            self.record(format!("delete {key} {id}"));
            Ok(())
        }

        async fn get_transitions(&self, key: &str) -> Result<Vec<Transition>> {
            self.record(format!("transitions {key}"));
            Ok(self.transitions.clone())
        }

        async fn apply_transition(&self, key: &str, transition_id: &str) -> Result<()> {
            self.record(format!("apply {key} {transition_id}"));
            Ok(())
        }
    }

    fn base_fields() -> Map<String, Value> {
        let value = json!({
            "created": "2024-01-01T00:00:00.000+0000",
            "updated": "2024-01-02T00:00:00Z",
            "status": {"name": "Open"},
            "resolution": null,
            "priority": {"name": "Major"},
            "reporter": {"name": "alice", "displayName": "Alice", "emailAddress": "alice@x"},
            "assignee": null,
            "summary": "Crash on start",
            "description": null,
            "customfield_10010": {"value": "S1"},
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn issue_with(transport: FakeTransport) -> (Issue, Arc<FakeTransport>) {
        let transport = Arc::new(transport);
        let config = TrackerConfig::new().with_field_map(FieldMap::new([("severity", "customfield_10010")]));
        let tracker = Tracker::with_transport(config, transport.clone(), Arc::new(NoUserDirectory));
        let issue = tracker.issue("A-1").await.unwrap();
        (issue, transport)
    }

    fn fake(transitions: Vec<Transition>) -> FakeTransport {
        FakeTransport {
            fields: Mutex::new(base_fields()),
            transitions,
            ..FakeTransport::default()
        }
    }

    #[tokio::test]
    async fn construction_freezes_essential_fields() {
        let (issue, transport) = issue_with(fake(vec![])).await;
        let snapshot = issue.snapshot().unwrap();

        assert_eq!(snapshot.status.as_deref(), Some("Open"));
        assert_eq!(snapshot.priority.as_deref(), Some("Major"));
        assert_eq!(snapshot.resolution, None);
        assert_eq!(snapshot.summary.as_deref(), Some("Crash on start"));
        assert_eq!(snapshot.reporter.as_ref().map(UserRef::name), Some("alice"));
        assert_eq!(snapshot.custom["severity"], json!({"value": "S1"}));
        assert_eq!(
            transport.calls(),
            vec!["fetch A-1 created,updated,status,resolution,priority,reporter,assignee,summary,description,customfield_10010"]
        );
    }

    #[tokio::test]
    async fn set_status_is_a_no_op_when_already_there() {
        let (issue, transport) = issue_with(fake(vec![Transition::new("5", "Open")])).await;
        let change = issue.set_status("Open").await.unwrap();

        assert_eq!(change, StatusChange::Unchanged);
        assert!(!transport.calls().iter().any(|call| call.starts_with("transitions")));
    }

    #[tokio::test]
    async fn set_status_picks_first_matching_transition() {
        let transitions = vec![
            Transition {
                id: None,
                name: Some("Broken".to_string()),
                to: Transition::new("0", "Closed").to,
            },
            Transition::new("11", "In Progress"),
            Transition::new("21", "Closed"),
            Transition::new("31", "Closed"),
        ];
        let (issue, transport) = issue_with(fake(transitions)).await;
        let change = issue.set_status("Closed").await.unwrap();

        assert_eq!(
            change,
            StatusChange::Transitioned {
                transition_id: "21".to_string()
            }
        );
        assert_eq!(transport.calls().last().unwrap(), "apply A-1 21");
    }

    #[tokio::test]
    async fn set_status_reports_unreachable_targets() {
        let (issue, transport) = issue_with(fake(vec![Transition::new("1", "Open")])).await;
        let change = issue.set_status("Closed").await.unwrap();

        assert_eq!(change, StatusChange::NotReachable);
        assert!(!change.reached());
        assert!(!transport.calls().iter().any(|call| call.starts_with("apply")));

        let err = issue.require_status("Closed").await.unwrap_err();
        assert!(matches!(err, TrackerError::TransitionNotFound { .. }));
    }

    #[tokio::test]
    async fn set_status_proceeds_when_status_read_fails() {
        let mut transport = fake(vec![Transition::new("21", "Closed")]);
        transport.status_fails = true;
        let (issue, transport) = issue_with(transport).await;

        let change = issue.set_status("Closed").await.unwrap();
        assert!(change.reached());
        assert_eq!(transport.calls().last().unwrap(), "apply A-1 21");
    }

    #[tokio::test]
    async fn rejected_issue_is_invalid_and_refuses_operations() {
        let transport = FakeTransport {
            rejected: Some("Issue key is malformed".to_string()),
            ..FakeTransport::default()
        };
        let (issue, transport) = issue_with(transport).await;

        assert!(!issue.is_valid());
        assert_eq!(issue.invalid_reason(), Some("Issue key is malformed"));
        for err in [
            issue.get_field("summary").await.unwrap_err(),
            issue.set_field("summary", "x").await.unwrap_err(),
            issue.add_comment("hi").await.unwrap_err(),
            issue.set_status("Closed").await.unwrap_err(),
        ] {
            assert!(matches!(err, TrackerError::InvalidIssue { ref key, .. } if key == "A-1"));
        }
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn writes_are_denormalized_into_one_call() {
        let (issue, transport) = issue_with(fake(vec![])).await;
        issue
            .set_fields([("priority", json!("Minor")), ("severity", json!("S3"))])
            .await
            .unwrap();

        assert_eq!(
            transport.calls().last().unwrap(),
            r#"write A-1 {"customfield_10010":"S3","priority":{"name":"Minor"}}"#
        );
    }

    #[tokio::test]
    async fn get_fields_translates_custom_names_both_ways() {
        let (issue, transport) = issue_with(fake(vec![])).await;
        let fields = issue.get_fields(&["severity", "status"]).await.unwrap();

        assert_eq!(fields["severity"], FieldValue::Json(json!({"value": "S1"})));
        assert_eq!(fields["status"], FieldValue::Name("Open".to_string()));
        assert_eq!(transport.calls().last().unwrap(), "fetch A-1 customfield_10010,status");
    }

    #[tokio::test]
    async fn comments_are_parsed_and_deleted_by_id() {
        let comment: RawComment = serde_json::from_value(json!({
            "id": 10000,
            "author": {"name": "bob", "displayName": "Bob", "emailAddress": "bob@x"},
            "body": "Looks fixed",
            "created": "2024-02-01T09:00:00.000+0000",
            "updated": "2024-02-01T09:05:00.000+0000",
        }))
        .unwrap();
        let transport = FakeTransport {
            fields: Mutex::new(base_fields()),
            comments: vec![comment],
            ..FakeTransport::default()
        };
        let (issue, transport) = issue_with(transport).await;

        let comments = issue.get_comments().await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id.as_str(), "10000");
        assert_eq!(comments[0].body, "Looks fixed");
        assert_eq!(comments[0].author.as_ref().map(UserRef::name), Some("bob"));
        assert!(comments[0].created.is_some());

        issue.delete_comment(&comments[0]).await.unwrap();
        issue.delete_comment("10001").await.unwrap();
        let calls = transport.calls();
        assert_eq!(&calls[calls.len() - 2..], &["delete A-1 10000", "delete A-1 10001"]);
    }
}
