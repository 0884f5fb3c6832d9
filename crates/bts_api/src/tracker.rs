//! Entry point: owns the configuration, the active transport and the user resolver.

use std::sync::Arc;

use tracing::debug;

use crate::client::TrackerClient;
use crate::config::{TrackerConfig, TransportKind};
use crate::error::{Result, TrackerError};
use crate::helper::HelperProcess;
use crate::issue::Issue;
use crate::transport::Transport;
use crate::user::UserResolver;

pub(crate) struct TrackerInner {
    pub(crate) config: TrackerConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) resolver: Arc<dyn UserResolver>,
}

/// Handle to one configured tracker. Cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    /// Picks the transport named by the configuration.
    pub fn new(config: TrackerConfig, resolver: Arc<dyn UserResolver>) -> Result<Self> {
        let transport: Arc<dyn Transport> = match &config.transport {
            TransportKind::Http => Arc::new(TrackerClient::new(config.clone())?),
            TransportKind::Process(_) => Arc::new(HelperProcess::from_config(&config)?),
        };
        Ok(Self::with_transport(config, transport, resolver))
    }

    pub fn with_transport(
        config: TrackerConfig,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn UserResolver>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                config,
                transport,
                resolver,
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Fetches one issue and freezes its essential fields.
    ///
    /// A tracker rejection yields an invalid issue, not an error.
    pub async fn issue(&self, key: &str) -> Result<Issue> {
        self.construct(&[key.to_string()])
            .await
            .pop()
            .unwrap_or_else(|| Err(no_result(key)))
    }

    /// Resolves every key independently; one bad key never fails the others.
    ///
    /// The result has the same length and order as `keys`, with the error message
    /// in place of each issue that could not be constructed.
    pub async fn find<S: AsRef<str>>(&self, keys: &[S]) -> Vec<std::result::Result<Issue, String>> {
        let keys: Vec<String> = keys.iter().map(|key| key.as_ref().to_string()).collect();
        self.construct(&keys)
            .await
            .into_iter()
            .map(|result| result.map_err(|err| err.to_string()))
            .collect()
    }

    async fn construct(&self, keys: &[String]) -> Vec<Result<Issue>> {
        let essential = self.inner.config.field_map.essential_names();
        let (natives, reverse) = self.inner.config.field_map.to_native_names(&essential);
        debug!("constructing {} issue(s)", keys.len());

        let mut fetched = self
            .inner
            .transport
            .fetch_issues(keys, &natives)
            .await
            .into_iter();
        keys.iter()
            .map(|key| {
                let result = fetched.next().unwrap_or_else(|| Err(no_result(key)));
                Issue::from_fetched(self.inner.clone(), key.clone(), result?, &reverse)
            })
            .collect()
    }
}

fn no_result(key: &str) -> TrackerError {
    TrackerError::transport(format!("no result for {key}"))
}
