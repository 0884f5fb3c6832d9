//! User references and the host-supplied resolver that turns names into known users.

use std::error::Error as StdError;

use serde::Serialize;
use serde_json::Value;

use crate::models::RawUser;

pub type ResolveError = Box<dyn StdError + Send + Sync>;

/// A user known to the calling system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub name: String,
    pub fullname: Option<String>,
    pub email: Option<String>,
}

/// Outcome of resolving a tracker user against the calling system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UserRef {
    Resolved(User),
    /// The caller does not know this user; display data comes from the tracker payload.
    Unresolved {
        name: String,
        fullname: Option<String>,
        email: Option<String>,
    },
}

impl UserRef {
    pub fn name(&self) -> &str {
        match self {
            UserRef::Resolved(user) => &user.name,
            UserRef::Unresolved { name, .. } => name,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, UserRef::Resolved(_))
    }
}

/// Capability supplied by the calling system to map tracker user names to its own users.
pub trait UserResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<User, ResolveError>;
}

/// Resolver for callers without a user directory; every user stays unresolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUserDirectory;

impl UserResolver for NoUserDirectory {
    fn resolve(&self, name: &str) -> Result<User, ResolveError> {
        Err(format!("no user directory to resolve {name:?}").into())
    }
}

/// Turns a raw user payload into a [`UserRef`]; `null` stays `None`.
pub fn resolve_user(raw: &Value, resolver: &dyn UserResolver) -> Option<UserRef> {
    let user = match raw {
        Value::Null => return None,
        Value::String(name) => RawUser {
            name: Some(name.clone()),
            ..RawUser::default()
        },
        other => serde_json::from_value::<RawUser>(other.clone()).unwrap_or_default(),
    };

    if let Some(handle) = user.handle() {
        match resolver.resolve(handle) {
            Ok(resolved) => return Some(UserRef::Resolved(resolved)),
            Err(err) => tracing::debug!("user {handle:?} not resolved: {err}"),
        }
    }

    Some(UserRef::Unresolved {
        name: user.handle().unwrap_or_default().to_string(),
        fullname: user.display_name,
        email: user.email_address,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct OnlyAlice;

    impl UserResolver for OnlyAlice {
        fn resolve(&self, name: &str) -> Result<User, ResolveError> {
            if name == "alice" {
                Ok(User {
                    name: "alice".to_string(),
                    fullname: Some("Alice Liddell".to_string()),
                    email: None,
                })
            } else {
                Err("unknown user".into())
            }
        }
    }

    #[test]
    fn known_user_is_resolved() {
        let value = json!({"name": "alice", "displayName": "A. L.", "emailAddress": "a@x"});
        let user = resolve_user(&value, &OnlyAlice).unwrap();
        assert!(user.is_resolved());
        assert_eq!(user.name(), "alice");
    }

    #[test]
    fn unknown_user_falls_back_to_payload_fields() {
        let value = json!({"name": "bob", "displayName": "Bob B.", "emailAddress": "bob@x"});
        let user = resolve_user(&value, &OnlyAlice).unwrap();
        assert_eq!(
            user,
            UserRef::Unresolved {
                name: "bob".to_string(),
                fullname: Some("Bob B.".to_string()),
                email: Some("bob@x".to_string()),
            }
        );
    }

    #[test]
    fn null_stays_null() {
        assert!(resolve_user(&Value::Null, &NoUserDirectory).is_none());
    }
}
