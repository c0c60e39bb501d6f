//! Builder for configuring a [`ResilientClient`].

use std::sync::Arc;

use crate::auth::TokenStore;
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::network::{DynProber, EndpointSelector, HttpProber, ResilientClient};
use crate::offline::OfflineDataset;
use crate::platform::PlatformInfo;

/// Builder for configuring [`ResilientClient`] initialization.
///
/// # Example
///
/// ```rust,ignore
/// use fieldbook_core::{ClientBuilder, PlatformInfo, ResolverConfig};
///
/// let client = ClientBuilder::new(ResolverConfig::new().with_lan_host("192.168.1.50"))
///     .with_platform(PlatformInfo::android_emulator())
///     .with_token("secret")
///     .build()?;
/// ```
pub struct ClientBuilder {
    config: ResolverConfig,
    platform: Option<PlatformInfo>,
    prober: Option<DynProber>,
    dataset: Option<Arc<OfflineDataset>>,
    tokens: Option<Arc<TokenStore>>,
    monitor: bool,
}

impl ClientBuilder {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            platform: None,
            prober: None,
            dataset: None,
            tokens: None,
            monitor: false,
        }
    }

    /// Platform signal supplied by the host.
    ///
    /// Default: [`PlatformInfo::host`]
    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Replace the HTTP health prober, mainly for tests.
    pub fn with_prober(mut self, prober: DynProber) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Use a specific offline dataset instead of the configured or bundled one.
    pub fn with_dataset(mut self, dataset: Arc<OfflineDataset>) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Share a credential store with the rest of the application.
    pub fn with_token_store(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.tokens = Some(Arc::new(TokenStore::with_token(token)));
        self
    }

    /// Start background re-resolution once the client is built.
    ///
    /// Requires a running Tokio runtime. Default: `false`
    pub fn with_monitoring(mut self, enable: bool) -> Self {
        self.monitor = enable;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ResilientClient> {
        self.config.validate()?;

        let dataset = match (self.dataset, &self.config.offline_dataset_path) {
            (Some(dataset), _) => dataset,
            (None, Some(path)) => Arc::new(OfflineDataset::from_json_file(path)?),
            (None, None) => OfflineDataset::bundled(),
        };

        let prober = match self.prober {
            Some(prober) => prober,
            None => Arc::new(HttpProber::with_health_path(&self.config.health_path)?),
        };

        let platform = self.platform.unwrap_or_else(PlatformInfo::host);
        let selector = EndpointSelector::new(self.config.clone(), platform, prober);
        let tokens = self.tokens.unwrap_or_default();

        let client = ResilientClient::from_parts(self.config, selector, dataset, tokens)?;
        if self.monitor {
            client.selector().start_monitoring();
        }

        tracing::debug!(
            "Built resilient client for {} (offline dataset v{})",
            platform.os,
            client.dataset().version()
        );
        Ok(client)
    }
}
