//! Command-line flags of the helper program.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Each operation flag may repeat; operations run grouped by kind, in the order
/// the fields below are declared.
#[derive(Debug, Parser)]
#[command(name = "bts-helper", version, about = "BTS access utility")]
pub struct Cli {
    /// Base URL of the tracker's JSON API.
    #[arg(long, value_name = "URL")]
    pub api_url: String,

    /// Path to a `{"username", "password"}` credentials document.
    #[arg(long, value_name = "PATH")]
    pub credentials: Option<PathBuf>,

    /// Path to a `{"canonical": "native"}` custom field document.
    #[arg(long, value_name = "PATH")]
    pub custom_fields: Option<PathBuf>,

    /// Fetch basic issue information.
    #[arg(long, value_name = "ISSUE_KEY", action = ArgAction::Append)]
    pub get_issue: Vec<String>,

    /// Get a field.
    #[arg(long, num_args = 2, value_names = ["ISSUE_KEY", "FIELD_NAME"], action = ArgAction::Append)]
    pub get_field: Vec<String>,

    /// Set a field. VALUE is parsed as JSON, falling back to a plain string.
    #[arg(long, num_args = 3, value_names = ["ISSUE_KEY", "FIELD_NAME", "VALUE"], action = ArgAction::Append)]
    pub set_field: Vec<String>,

    /// Add a comment to an issue.
    #[arg(long, num_args = 2, value_names = ["ISSUE_KEY", "TEXT"], action = ArgAction::Append)]
    pub add_comment: Vec<String>,

    /// List the comments of an issue.
    #[arg(long, value_name = "ISSUE_KEY", action = ArgAction::Append)]
    pub get_comments: Vec<String>,

    /// Delete a comment.
    #[arg(long, num_args = 2, value_names = ["ISSUE_KEY", "COMMENT_ID"], action = ArgAction::Append)]
    pub delete_comment: Vec<String>,

    /// List the transitions available from the issue's current status.
    #[arg(long, value_name = "ISSUE_KEY", action = ArgAction::Append)]
    pub get_transitions: Vec<String>,

    /// Apply a workflow transition.
    #[arg(long, num_args = 2, value_names = ["ISSUE_KEY", "TRANSITION_ID"], action = ArgAction::Append)]
    pub apply_transition: Vec<String>,
}

impl Cli {
    pub fn field_reads(&self) -> impl Iterator<Item = (&str, &str)> {
        pairs(&self.get_field)
    }

    pub fn field_writes(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.set_field
            .chunks_exact(3)
            .map(|chunk| (chunk[0].as_str(), chunk[1].as_str(), chunk[2].as_str()))
    }

    pub fn comments_to_add(&self) -> impl Iterator<Item = (&str, &str)> {
        pairs(&self.add_comment)
    }

    pub fn comments_to_delete(&self) -> impl Iterator<Item = (&str, &str)> {
        pairs(&self.delete_comment)
    }

    pub fn transitions_to_apply(&self) -> impl Iterator<Item = (&str, &str)> {
        pairs(&self.apply_transition)
    }
}

fn pairs(values: &[String]) -> impl Iterator<Item = (&str, &str)> {
    values
        .chunks_exact(2)
        .map(|chunk| (chunk[0].as_str(), chunk[1].as_str()))
}
