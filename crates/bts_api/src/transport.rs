//! The request/response contract shared by the direct HTTP client and the helper process.
//!
//! Transports speak tracker-native field names only; translation to canonical names
//! happens above this layer so it is never duplicated per transport.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{FetchedFields, RawComment, Transition};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads the given native fields of one issue.
    async fn fetch_fields(&self, key: &str, native_names: &[String]) -> Result<FetchedFields>;

    /// Reads the same fields for several issues, one result per key, in key order.
    ///
    /// The default issues one independent request per key.
    async fn fetch_issues(&self, keys: &[String], native_names: &[String]) -> Vec<Result<FetchedFields>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.fetch_fields(key, native_names).await);
        }
        results
    }

    /// Writes all given native fields in a single request.
    async fn write_fields(&self, key: &str, fields: &Map<String, Value>) -> Result<()>;

    async fn post_comment(&self, key: &str, body: &str) -> Result<()>;

    async fn list_comments(&self, key: &str) -> Result<Vec<RawComment>>;

    async fn delete_comment(&self, key: &str, id: &str) -> Result<()>;

    /// Transitions available from the issue's current state, in tracker order.
    async fn get_transitions(&self, key: &str) -> Result<Vec<Transition>>;

    async fn apply_transition(&self, key: &str, transition_id: &str) -> Result<()>;
}
