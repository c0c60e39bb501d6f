//! Subcommand implementations. Each returns the JSON document printed on stdout.

use crate::cli::Command;
use anyhow::{anyhow, Context, Result};
use fieldbook_core::network::{generate_candidates, HttpProber, Prober};
use fieldbook_core::{
    CancellationToken, ClientBuilder, HttpMethod, PlatformInfo, RequestDescriptor,
    ResolverConfig,
};
use serde_json::{json, Value};
use tracing::{info, warn};

pub async fn run(
    command: &Command,
    config: ResolverConfig,
    platform: PlatformInfo,
    token: Option<String>,
) -> Result<Value> {
    match command {
        Command::Candidates => candidates(&config, platform),
        Command::Probe => probe(&config, platform).await,
        Command::Resolve => resolve(config, platform).await,
        Command::Request {
            method,
            path,
            body,
            auth,
            resource,
        } => {
            let request = build_request(method, path, body.as_deref(), *auth, resource.as_deref())?;
            execute(config, platform, token, request).await
        }
        Command::Dataset => dataset(config),
    }
}

fn candidates(config: &ResolverConfig, platform: PlatformInfo) -> Result<Value> {
    let candidates = generate_candidates(&platform, config);
    Ok(json!({
        "platform": platform,
        "candidates": candidates,
    }))
}

async fn probe(config: &ResolverConfig, platform: PlatformInfo) -> Result<Value> {
    let prober = HttpProber::with_health_path(&config.health_path)?;
    let candidates = generate_candidates(&platform, config);
    let results = futures::future::join_all(
        candidates
            .iter()
            .map(|candidate| prober.probe(candidate, config.probe_timeout)),
    )
    .await;

    for result in &results {
        info!("{} -> {}", result.candidate, result.outcome());
    }
    Ok(json!({ "results": results }))
}

async fn resolve(config: ResolverConfig, platform: PlatformInfo) -> Result<Value> {
    let client = ClientBuilder::new(config).with_platform(platform).build()?;
    let selector = client.selector();
    match selector.resolve().await {
        Ok(endpoint) => info!("Resolved {}", endpoint.candidate),
        Err(e) => warn!("Resolution failed: {}", e),
    }
    Ok(serde_json::to_value(selector.status())?)
}

pub fn build_request(
    method: &str,
    path: &str,
    body: Option<&str>,
    auth: bool,
    resource: Option<&str>,
) -> Result<RequestDescriptor> {
    let method =
        HttpMethod::parse(method).ok_or_else(|| anyhow!("Unsupported HTTP method: {}", method))?;
    let mut request = RequestDescriptor::new(method, path);
    if let Some(body) = body {
        let body: Value = serde_json::from_str(body).context("Request body is not valid JSON")?;
        request = request.with_body(body);
    }
    if auth {
        request = request.authenticated();
    }
    if let Some(resource) = resource {
        request = request.with_resource(resource);
    }
    Ok(request)
}

async fn execute(
    config: ResolverConfig,
    platform: PlatformInfo,
    token: Option<String>,
    request: RequestDescriptor,
) -> Result<Value> {
    let mut builder = ClientBuilder::new(config).with_platform(platform);
    if let Some(token) = token {
        builder = builder.with_token(token);
    }
    let client = builder.build()?;

    // Ctrl-C abandons the in-flight request
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let payload = client
        .execute_with_cancel(&request, &cancel)
        .await
        .with_context(|| format!("{} {} failed", request.method, request.path))?;
    Ok(serde_json::to_value(payload)?)
}

fn dataset(config: ResolverConfig) -> Result<Value> {
    let client = ClientBuilder::new(config).build()?;
    let dataset = client.dataset();
    Ok(json!({
        "version": dataset.version(),
        "resources": dataset.keys(),
    }))
}
