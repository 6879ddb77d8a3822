//! The authenticated session every operation runs against.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::MythicConfig;
use crate::error::Result;
use crate::graphql::GraphqlRequest;
use crate::transport::{CombinedTransport, Subscription, Transport};

/// Handle to one Mythic server. Cheap to clone; read-only after creation.
#[derive(Clone)]
pub struct Mythic {
    config: Arc<MythicConfig>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Mythic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mythic")
            .field("server", &self.config.http_url())
            .field("global_timeout_secs", &self.config.global_timeout_secs)
            .finish()
    }
}

impl Mythic {
    /// Build a session from configured credentials. Fails when no token is set.
    pub fn login(config: MythicConfig) -> Result<Self> {
        let config = Arc::new(config);
        let transport = CombinedTransport::new(config.clone())?;
        tracing::info!(
            "Using Mythic at {} as scripting_version {}",
            config.http_url(),
            config.scripting_version
        );
        Ok(Self {
            config,
            transport: Arc::new(transport),
        })
    }

    /// Build a session over a caller-supplied transport.
    pub fn with_transport(config: MythicConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &MythicConfig {
        &self.config
    }

    /// Explicit timeout if given, else the configured global timeout.
    pub fn resolve_timeout(&self, timeout: Option<Duration>) -> Option<Duration> {
        self.config.resolve_timeout(timeout)
    }

    /// Run a query and decode its `data` object into `T`.
    pub async fn query<T: DeserializeOwned>(&self, request: GraphqlRequest) -> Result<T> {
        let data = self.transport.query(request).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Run a mutation and decode its `data` object into `T`.
    pub async fn mutate<T: DeserializeOwned>(&self, request: GraphqlRequest) -> Result<T> {
        let data = self.transport.mutate(request).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn subscribe(
        &self,
        request: GraphqlRequest,
        timeout: Option<Duration>,
    ) -> Result<Subscription> {
        self.transport.subscribe(request, timeout).await
    }
}
