//! Resilient request client.
//!
//! Every application call goes through [`ResilientClient::execute`]:
//! - Resolves the backend endpoint through the shared [`EndpointSelector`]
//! - Attaches bearer credentials for protected calls
//! - Validates the response shape before anything is parsed
//! - Retries once on transport failure against a re-resolved endpoint
//! - Substitutes offline data for reads that cannot be served live

use crate::auth::TokenStore;
use crate::cancel::CancellationToken;
use crate::config::{NetworkConfig, ResolverConfig};
use crate::network::candidates::Candidate;
use crate::network::response::{inspect, BodyShape};
use crate::network::selector::EndpointSelector;
use crate::offline::{resource_key_for, OfflineDataset};
use crate::request::{Payload, RequestDescriptor};
use crate::{ClientError, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// The single choke point for backend calls.
#[derive(Clone)]
pub struct ResilientClient {
    http: Client,
    config: ResolverConfig,
    selector: EndpointSelector,
    dataset: Arc<OfflineDataset>,
    tokens: Arc<TokenStore>,
}

impl ResilientClient {
    pub(crate) fn from_parts(
        config: ResolverConfig,
        selector: EndpointSelector,
        dataset: Arc<OfflineDataset>,
        tokens: Arc<TokenStore>,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| ClientError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            config,
            selector,
            dataset,
            tokens,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn selector(&self) -> &EndpointSelector {
        &self.selector
    }

    pub fn dataset(&self) -> &Arc<OfflineDataset> {
        &self.dataset
    }

    /// Credential store used for `requires_auth` calls.
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Issue a request with no cancellation.
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<Payload> {
        self.execute_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Convenience wrapper for an unauthenticated GET.
    pub async fn get(&self, path: &str) -> Result<Payload> {
        self.execute(&RequestDescriptor::get(path)).await
    }

    /// Issue a request, abandoning it as soon as `cancel` fires.
    ///
    /// Cancellation drops the in-flight transport future and returns
    /// [`ClientError::Cancelled`]; it never falls back to offline data.
    pub async fn execute_with_cancel(
        &self,
        request: &RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Payload> {
        cancel.check()?;

        if request.requires_auth && !self.tokens.is_present() {
            return Err(ClientError::AuthRequired {
                path: request.path.clone(),
            });
        }

        if self.config.offline_mode {
            debug!("Offline mode: {} {} not sent", request.method, request.path);
            return self.fallback(
                request,
                ClientError::Unreachable {
                    message: "offline mode is enabled".to_string(),
                },
            );
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("{} {} cancelled", request.method, request.path);
                return Err(ClientError::Cancelled);
            }
            result = self.attempt(request) => result,
        };

        match result {
            Ok(payload) => Ok(payload),
            Err(e) if e.is_recoverable() => self.fallback(request, e),
            Err(e) => Err(e),
        }
    }

    /// Resolve and dispatch, with one retry on a transport failure.
    async fn attempt(&self, request: &RequestDescriptor) -> Result<Payload> {
        let endpoint = self.selector.resolve().await?;
        match self.dispatch(&endpoint.candidate, request).await {
            Err(e) if e.is_transport() => {
                warn!(
                    "{} {} failed against {}, retrying after re-resolution: {}",
                    request.method, request.path, endpoint.candidate, e
                );
                let endpoint = self.selector.refresh().await?;
                self.dispatch(&endpoint.candidate, request).await
            }
            other => other,
        }
    }

    async fn dispatch(&self, candidate: &Candidate, request: &RequestDescriptor) -> Result<Payload> {
        let raw_url = candidate.url(&request.path);
        let url = url::Url::parse(&raw_url).map_err(|e| ClientError::Config {
            message: format!("Invalid request URL {}: {}", raw_url, e),
        })?;

        let mut builder = self
            .http
            .request(request.method.into(), url.clone())
            .timeout(self.config.request_timeout)
            .header(ACCEPT, "application/json");

        if request.requires_auth {
            let token = self.tokens.get().ok_or_else(|| ClientError::AuthRequired {
                path: request.path.clone(),
            })?;
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.selector.report_outcome(candidate, false);
                return Err(ClientError::transport(url.as_str(), &e));
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                self.selector.report_outcome(candidate, false);
                return Err(ClientError::transport(url.as_str(), &e));
            }
        };

        let result = classify_response(status, content_type.as_deref(), &body);
        self.selector
            .report_outcome(candidate, endpoint_healthy(&result));

        debug!(
            "{} {} -> {} in {}ms",
            request.method,
            url,
            status,
            started.elapsed().as_millis()
        );
        result
    }

    /// Substitute offline data for a failed read, or surface `error`.
    fn fallback(&self, request: &RequestDescriptor, error: ClientError) -> Result<Payload> {
        if request.method.is_write() {
            return Err(error);
        }

        let key = request
            .resource
            .clone()
            .or_else(|| resource_key_for(&request.path));
        let Some(key) = key else {
            return Err(error);
        };

        match self.dataset.lookup(&key) {
            Some(substitute) => {
                warn!(
                    "Serving offline data for {} {} (resource {}, dataset v{}): {}",
                    request.method,
                    request.path,
                    key,
                    self.dataset.version(),
                    error
                );
                Ok(Payload::Offline(substitute.clone()))
            }
            None => Err(error),
        }
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("selector", &self.selector)
            .field("offline_mode", &self.config.offline_mode)
            .field("dataset_version", &self.dataset.version())
            .finish()
    }
}

/// Map a received response to a payload or a typed error.
///
/// 2xx needs a JSON body (204 aside); a non-2xx JSON body is the backend's
/// own error and is surfaced verbatim as `BadStatus`.
pub fn classify_response(status: u16, content_type: Option<&str>, body: &[u8]) -> Result<Payload> {
    if status == 204 {
        return Ok(Payload::Empty);
    }

    let shape = inspect(content_type, body);
    let success = (200..300).contains(&status);
    match shape {
        BodyShape::Json(value) if success => Ok(Payload::from_live(value)),
        BodyShape::Json(body) => Err(ClientError::BadStatus { status, body }),
        other => Err(ClientError::MalformedResponse {
            status: Some(status),
            reason: other.describe(),
        }),
    }
}

/// Whether a request result says the endpoint itself is working.
///
/// A 4xx with a structured body is the application talking, so it counts as
/// healthy; 5xx, malformed bodies and transport failures do not.
fn endpoint_healthy(result: &Result<Payload>) -> bool {
    match result {
        Ok(_) => true,
        Err(ClientError::BadStatus { status, .. }) => !is_server_error(*status),
        Err(_) => false,
    }
}

/// Check if an HTTP status code is a server-side failure.
pub fn is_server_error(status: u16) -> bool {
    (500..600).contains(&status)
}
