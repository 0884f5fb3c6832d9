use serde::Deserialize;

/// User reference embedded in issue fields and comments.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    pub name: Option<String>,
    pub key: Option<String>,
    pub account_id: Option<String>,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
}

impl RawUser {
    /// Best identifier to hand to a user resolver.
    pub fn handle(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.key.as_deref())
            .or(self.account_id.as_deref())
    }
}
