use serde::{Deserialize, Serialize};

use super::deserialize_string_field;

/// One edge of the workflow graph, as offered for the issue's current state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    #[serde(default, deserialize_with = "deserialize_string_field", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<TransitionDestination>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDestination {
    #[serde(default, deserialize_with = "deserialize_string_field", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Transition {
    pub fn new(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
            to: Some(TransitionDestination {
                id: None,
                name: Some(target.into()),
            }),
        }
    }

    /// Name of the status this transition leads to.
    pub fn target_name(&self) -> Option<&str> {
        self.to.as_ref().and_then(|to| to.name.as_deref())
    }
}

/// Transition listings arrive either bare or wrapped as `{"transitions": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TransitionListing {
    Page { transitions: Vec<Transition> },
    List(Vec<Transition>),
}

impl TransitionListing {
    pub fn into_vec(self) -> Vec<Transition> {
        match self {
            TransitionListing::Page { transitions } => transitions,
            TransitionListing::List(transitions) => transitions,
        }
    }
}
