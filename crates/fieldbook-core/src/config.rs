//! Centralized configuration for endpoint resolution and requests.
//!
//! Constant defaults live on [`NetworkConfig`]. Everything a deployment may
//! change is carried by [`ResolverConfig`], which is passed explicitly into the
//! selector and client at construction time.

use crate::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Network-related constants.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const DEFAULT_PORT: u16 = 5000;
    pub const DEFAULT_SCHEME: &'static str = "http";
    pub const FALLBACK_HOST: &'static str = "localhost";
    pub const HEALTH_PATH: &'static str = "/api/health";
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const RESOLVE_DEADLINE: Duration = Duration::from_secs(6);
    pub const MAX_PARALLEL_PROBES: usize = 4;
    pub const FAILURE_THRESHOLD: u32 = 2;
    pub const MONITOR_INTERVAL: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = "Fieldbook-Connectivity/1.0";

    /// Host alias the Android emulator uses for the development machine.
    pub const ANDROID_EMULATOR_HOST: &'static str = "10.0.2.2";
    /// Loopback shared by the iOS simulator and the host machine.
    pub const IOS_SIMULATOR_HOST: &'static str = "127.0.0.1";
}

/// Deployment configuration for candidate generation, probing and requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Manually configured backend address (`host` or `host:port`).
    /// Always probed first when set.
    pub override_host: Option<String>,
    /// Known LAN addresses of the development backend, in preference order.
    pub lan_hosts: Vec<String>,
    /// Last-resort host appended to every candidate list.
    pub fallback_host: String,
    /// Port used when a host entry does not carry one.
    pub port: u16,
    pub scheme: String,
    pub health_path: String,
    #[serde(with = "duration_ms", rename = "probe_timeout_ms")]
    pub probe_timeout: Duration,
    #[serde(with = "duration_ms", rename = "request_timeout_ms")]
    pub request_timeout: Duration,
    /// Outer bound on a whole probing cycle.
    #[serde(with = "duration_ms", rename = "resolve_deadline_ms")]
    pub resolve_deadline: Duration,
    pub max_parallel_probes: usize,
    /// Consecutive request failures after which the cached endpoint is dropped.
    pub failure_threshold: u32,
    /// Route every read through the offline dataset without touching the network.
    pub offline_mode: bool,
    /// Replacement for the bundled offline dataset.
    pub offline_dataset_path: Option<PathBuf>,
    /// Re-resolution interval for background monitoring while unresolved.
    #[serde(with = "duration_ms", rename = "monitor_interval_ms")]
    pub monitor_interval: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            override_host: None,
            lan_hosts: Vec::new(),
            fallback_host: NetworkConfig::FALLBACK_HOST.to_string(),
            port: NetworkConfig::DEFAULT_PORT,
            scheme: NetworkConfig::DEFAULT_SCHEME.to_string(),
            health_path: NetworkConfig::HEALTH_PATH.to_string(),
            probe_timeout: NetworkConfig::PROBE_TIMEOUT,
            request_timeout: NetworkConfig::REQUEST_TIMEOUT,
            resolve_deadline: NetworkConfig::RESOLVE_DEADLINE,
            max_parallel_probes: NetworkConfig::MAX_PARALLEL_PROBES,
            failure_threshold: NetworkConfig::FAILURE_THRESHOLD,
            offline_mode: false,
            offline_dataset_path: None,
            monitor_interval: NetworkConfig::MONITOR_INTERVAL,
        }
    }
}

impl ResolverConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the manual override address.
    pub fn with_override_host(mut self, host: impl Into<String>) -> Self {
        self.override_host = Some(host.into());
        self
    }

    /// Append a known LAN address.
    pub fn with_lan_host(mut self, host: impl Into<String>) -> Self {
        self.lan_hosts.push(host.into());
        self
    }

    pub fn with_fallback_host(mut self, host: impl Into<String>) -> Self {
        self.fallback_host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_resolve_deadline(mut self, deadline: Duration) -> Self {
        self.resolve_deadline = deadline;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Enable or disable offline mode.
    pub fn with_offline_mode(mut self, offline: bool) -> Self {
        self.offline_mode = offline;
        self
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ClientError::io_with_path(e, path))?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make resolution or requests impossible.
    pub fn validate(&self) -> Result<()> {
        let zero_durations = [
            ("probe_timeout", self.probe_timeout),
            ("request_timeout", self.request_timeout),
            ("resolve_deadline", self.resolve_deadline),
        ];
        for (field, value) in zero_durations {
            if value.is_zero() {
                return Err(ClientError::Config {
                    message: format!("{} must be greater than zero", field),
                });
            }
        }
        if self.max_parallel_probes == 0 {
            return Err(ClientError::Config {
                message: "max_parallel_probes must be at least 1".to_string(),
            });
        }
        if self.failure_threshold == 0 {
            return Err(ClientError::Config {
                message: "failure_threshold must be at least 1".to_string(),
            });
        }
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(ClientError::Config {
                message: format!("unsupported scheme: {}", self.scheme),
            });
        }
        if !self.health_path.starts_with('/') {
            return Err(ClientError::Config {
                message: format!("health_path must start with '/': {}", self.health_path),
            });
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
