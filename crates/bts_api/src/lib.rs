//! Issue synchronization layer for Jira-style REST trackers.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod fields;
pub mod helper;
pub mod issue;
pub mod models;
pub mod normalize;
pub mod tracker;
pub mod transport;
pub mod user;

pub use auth::Credentials;
pub use client::TrackerClient;
pub use config::{HelperCommand, Settings, TrackerConfig, TransportKind, TransportSettings};
pub use error::{Result, TrackerError};
pub use fields::{FieldMap, FieldSet, FieldValue, ESSENTIAL_FIELDS};
pub use helper::HelperProcess;
pub use issue::{CommentId, Issue, IssueComment, IssueSnapshot, StatusChange};
pub use models::{FetchedFields, RawComment, Transition, TransitionDestination};
pub use tracker::Tracker;
pub use transport::Transport;
pub use user::{NoUserDirectory, User, UserRef, UserResolver};
