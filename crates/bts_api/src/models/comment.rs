use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::deserialize_string_field;

/// Comment exactly as the tracker returns it; `author` stays raw for user resolution.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawComment {
    #[serde(default, deserialize_with = "deserialize_string_field", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Value,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

/// Comment listings arrive either bare or paged as `{"comments": [...], "total": n}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CommentListing {
    Page { comments: Vec<RawComment> },
    List(Vec<RawComment>),
}

impl CommentListing {
    pub fn into_vec(self) -> Vec<RawComment> {
        match self {
            CommentListing::Page { comments } => comments,
            CommentListing::List(comments) => comments,
        }
    }
}
