//! Connectivity probing.
//!
//! A probe is a short `GET` against the health path of one candidate, bounded
//! by a timeout that covers connect, headers and body. When the timeout fires
//! the request future is dropped, which tears down the connection attempt.

use crate::config::NetworkConfig;
use crate::network::candidates::Candidate;
use crate::network::response::{inspect, BodyShape};
use crate::{ClientError, Result};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::{header, Client};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// The four ways a probe can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Ok,
    BadStatus,
    MalformedBody,
    Unreachable,
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Ok => write!(f, "ok"),
            ProbeOutcome::BadStatus => write!(f, "bad_status"),
            ProbeOutcome::MalformedBody => write!(f, "malformed_body"),
            ProbeOutcome::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Classified probe failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeError {
    BadStatus { status: u16 },
    MalformedBody { reason: String },
    Unreachable { reason: String },
}

impl ProbeError {
    pub fn outcome(&self) -> ProbeOutcome {
        match self {
            ProbeError::BadStatus { .. } => ProbeOutcome::BadStatus,
            ProbeError::MalformedBody { .. } => ProbeOutcome::MalformedBody,
            ProbeError::Unreachable { .. } => ProbeOutcome::Unreachable,
        }
    }
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::BadStatus { status } => write!(f, "health check returned {}", status),
            ProbeError::MalformedBody { reason } => write!(f, "malformed health body: {}", reason),
            ProbeError::Unreachable { reason } => write!(f, "unreachable: {}", reason),
        }
    }
}

/// Result of probing one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub candidate: Candidate,
    pub reachable: bool,
    pub latency_ms: u64,
    pub classified_error: Option<ProbeError>,
}

impl ProbeResult {
    pub fn ok(candidate: Candidate, latency: Duration) -> Self {
        Self {
            candidate,
            reachable: true,
            latency_ms: latency.as_millis() as u64,
            classified_error: None,
        }
    }

    pub fn failed(candidate: Candidate, latency: Duration, error: ProbeError) -> Self {
        Self {
            candidate,
            reachable: false,
            latency_ms: latency.as_millis() as u64,
            classified_error: Some(error),
        }
    }

    pub fn outcome(&self) -> ProbeOutcome {
        self.classified_error
            .as_ref()
            .map(ProbeError::outcome)
            .unwrap_or(ProbeOutcome::Ok)
    }

    pub fn is_ok(&self) -> bool {
        self.reachable
    }
}

/// Health check against a single candidate.
///
/// Implementations must honour `timeout` and report expiry as
/// [`ProbeOutcome::Unreachable`].
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, candidate: &Candidate, timeout: Duration) -> ProbeResult;
}

/// Shared prober handle.
pub type DynProber = Arc<dyn Prober>;

/// HTTP health prober.
pub struct HttpProber {
    client: Client,
    health_path: String,
}

impl HttpProber {
    /// Create a prober for the default health path.
    pub fn new() -> Result<Self> {
        Self::with_health_path(NetworkConfig::HEALTH_PATH)
    }

    pub fn with_health_path(health_path: impl Into<String>) -> Result<Self> {
        // Redirects are observed rather than followed; per-probe timeouts are applied around each request.
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| ClientError::Config {
                message: format!("Failed to create probe client: {}", e),
            })?;

        Ok(Self {
            client,
            health_path: health_path.into(),
        })
    }

    async fn fetch(&self, url: &str) -> std::result::Result<(u16, Option<String>, Vec<u8>), reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;
        Ok((status, content_type, body.to_vec()))
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, candidate: &Candidate, timeout: Duration) -> ProbeResult {
        let url = candidate.url(&self.health_path);
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, self.fetch(&url)).await {
            Err(_) => ProbeResult::failed(
                candidate.clone(),
                started.elapsed(),
                ProbeError::Unreachable {
                    reason: format!("no answer within {:?}", timeout),
                },
            ),
            Ok(Err(e)) => ProbeResult::failed(
                candidate.clone(),
                started.elapsed(),
                ProbeError::Unreachable {
                    reason: e.to_string(),
                },
            ),
            Ok(Ok((status, content_type, body))) => {
                classify_health(candidate, started.elapsed(), status, content_type.as_deref(), &body)
            }
        };

        debug!(
            "Probe {} -> {} in {}ms",
            url,
            result.outcome(),
            result.latency_ms
        );
        result
    }
}

/// Classify a health response that arrived in time.
pub fn classify_health(
    candidate: &Candidate,
    latency: Duration,
    status: u16,
    content_type: Option<&str>,
    body: &[u8],
) -> ProbeResult {
    if !(200..400).contains(&status) {
        return ProbeResult::failed(candidate.clone(), latency, ProbeError::BadStatus { status });
    }
    match inspect(content_type, body) {
        BodyShape::Json(_) => ProbeResult::ok(candidate.clone(), latency),
        other => ProbeResult::failed(
            candidate.clone(),
            latency,
            ProbeError::MalformedBody {
                reason: other.describe(),
            },
        ),
    }
}

/// Outcome of probing a candidate list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeSweep {
    /// Best-ranked candidate that answered `ok`.
    pub winner: Option<ProbeResult>,
    /// Every probe that settled before the sweep ended, in priority order.
    pub results: Vec<ProbeResult>,
}

/// Probe candidates with bounded parallelism and pick the best-ranked success.
///
/// Probes are started in priority order, at most `max_parallel` at a time. A
/// success is only final once every better-ranked candidate has settled; at
/// that point the remaining in-flight probes are dropped, cancelling them.
/// With `max_parallel == 1` this degenerates to sequential probing with a
/// per-candidate timeout.
pub async fn probe_candidates(
    prober: DynProber,
    candidates: &[Candidate],
    timeout: Duration,
    max_parallel: usize,
) -> ProbeSweep {
    let max_parallel = max_parallel.max(1);
    let mut settled: Vec<Option<ProbeResult>> = vec![None; candidates.len()];
    let mut best: Option<usize> = None;
    let mut next = 0;
    let mut in_flight = FuturesUnordered::new();

    loop {
        // Nothing ranked below the current best is worth starting
        let limit = best.unwrap_or(candidates.len());
        while in_flight.len() < max_parallel && next < limit {
            let index = next;
            let candidate = candidates[index].clone();
            let prober = Arc::clone(&prober);
            in_flight.push(async move { (index, prober.probe(&candidate, timeout).await) });
            next += 1;
        }

        if let Some(b) = best {
            if settled[..b].iter().all(Option::is_some) {
                break;
            }
        }

        match in_flight.next().await {
            Some((index, result)) => {
                if result.is_ok() && best.map_or(true, |b| index < b) {
                    best = Some(index);
                }
                settled[index] = Some(result);
            }
            None => break,
        }
    }

    if !in_flight.is_empty() {
        debug!("Cancelling {} outstanding probes", in_flight.len());
    }
    drop(in_flight);

    let winner = best.and_then(|b| settled[b].clone());
    ProbeSweep {
        winner,
        results: settled.into_iter().flatten().collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::network::candidates::CandidateSource;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) fn candidate(host: &str, priority: u32) -> Candidate {
        Candidate {
            host: host.to_string(),
            port: 5000,
            scheme: "http".to_string(),
            priority,
            source: CandidateSource::Lan,
        }
    }

    /// Scripted prober: per-host outcome and delay, counting invocations.
    #[derive(Default)]
    pub(crate) struct ScriptedProber {
        script: HashMap<String, (ProbeOutcome, Duration)>,
        pub calls: AtomicUsize,
        pub started: Mutex<Vec<String>>,
        pub completed: Mutex<Vec<String>>,
    }

    impl ScriptedProber {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with(mut self, host: &str, outcome: ProbeOutcome, delay: Duration) -> Self {
            self.script.insert(host.to_string(), (outcome, delay));
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, candidate: &Candidate, timeout: Duration) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.lock().unwrap().push(candidate.host.clone());
            let (outcome, delay) = self
                .script
                .get(&candidate.host)
                .copied()
                .unwrap_or((ProbeOutcome::Unreachable, Duration::ZERO));

            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                self.completed.lock().unwrap().push(candidate.host.clone());
                return ProbeResult::failed(
                    candidate.clone(),
                    timeout,
                    ProbeError::Unreachable {
                        reason: "timed out".into(),
                    },
                );
            }
            tokio::time::sleep(delay).await;
            self.completed.lock().unwrap().push(candidate.host.clone());

            let error = match outcome {
                ProbeOutcome::Ok => None,
                ProbeOutcome::BadStatus => Some(ProbeError::BadStatus { status: 503 }),
                ProbeOutcome::MalformedBody => Some(ProbeError::MalformedBody {
                    reason: "HTML document instead of JSON".into(),
                }),
                ProbeOutcome::Unreachable => Some(ProbeError::Unreachable {
                    reason: "connection refused".into(),
                }),
            };
            match error {
                None => ProbeResult::ok(candidate.clone(), delay),
                Some(e) => ProbeResult::failed(candidate.clone(), delay, e),
            }
        }
    }

    fn three_candidates() -> Vec<Candidate> {
        vec![
            candidate("10.0.2.2", 0),
            candidate("192.168.1.50", 1),
            candidate("localhost", 2),
        ]
    }

    #[test]
    fn test_classify_health() {
        let c = candidate("localhost", 0);
        let ok = classify_health(&c, Duration::ZERO, 200, Some("application/json"), br#"{"status":"ok"}"#);
        assert_eq!(ok.outcome(), ProbeOutcome::Ok);

        let bad = classify_health(&c, Duration::ZERO, 500, Some("application/json"), b"{}");
        assert_eq!(bad.outcome(), ProbeOutcome::BadStatus);

        let html = classify_health(&c, Duration::ZERO, 200, Some("text/html"), b"<html></html>");
        assert_eq!(html.outcome(), ProbeOutcome::MalformedBody);

        let empty = classify_health(&c, Duration::ZERO, 204, None, b"");
        assert_eq!(empty.outcome(), ProbeOutcome::MalformedBody);
        assert!(!empty.reachable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_ok_wins_regardless_of_position() {
        for ok_index in 0..3 {
            let candidates = three_candidates();
            let mut prober = ScriptedProber::new();
            for (i, c) in candidates.iter().enumerate() {
                let outcome = if i == ok_index {
                    ProbeOutcome::Ok
                } else {
                    ProbeOutcome::Unreachable
                };
                prober = prober.with(&c.host, outcome, Duration::from_millis(50));
            }

            let sweep =
                probe_candidates(Arc::new(prober), &candidates, Duration::from_secs(1), 4).await;
            let winner = sweep.winner.expect("one candidate is healthy");
            assert_eq!(winner.candidate, candidates[ok_index]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_breaks_ties_over_latency() {
        let candidates = three_candidates();
        // The fallback answers first, but the better-ranked LAN host also succeeds
        let prober = ScriptedProber::new()
            .with("10.0.2.2", ProbeOutcome::Unreachable, Duration::from_millis(100))
            .with("192.168.1.50", ProbeOutcome::Ok, Duration::from_millis(300))
            .with("localhost", ProbeOutcome::Ok, Duration::from_millis(10));

        let sweep = probe_candidates(Arc::new(prober), &candidates, Duration::from_secs(1), 4).await;
        assert_eq!(sweep.winner.unwrap().candidate.host, "192.168.1.50");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_rank_success_cancels_the_rest() {
        let candidates = three_candidates();
        let prober = Arc::new(
            ScriptedProber::new()
                .with("10.0.2.2", ProbeOutcome::Ok, Duration::from_millis(10))
                .with("192.168.1.50", ProbeOutcome::Ok, Duration::from_millis(500))
                .with("localhost", ProbeOutcome::Ok, Duration::from_millis(500)),
        );

        let sweep = probe_candidates(prober.clone(), &candidates, Duration::from_secs(1), 4).await;
        assert_eq!(sweep.winner.unwrap().candidate.host, "10.0.2.2");
        assert_eq!(sweep.results.len(), 1);
        assert_eq!(prober.started.lock().unwrap().len(), 3);
        assert_eq!(*prober.completed.lock().unwrap(), vec!["10.0.2.2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallelism_is_bounded() {
        let candidates: Vec<Candidate> = (0..6)
            .map(|i| candidate(&format!("10.0.0.{}", i), i))
            .collect();
        let prober = Arc::new(ScriptedProber::new());

        let sweep = probe_candidates(prober.clone(), &candidates, Duration::from_secs(1), 1).await;
        assert!(sweep.winner.is_none());
        assert_eq!(sweep.results.len(), 6);
        // Sequential: probes started and completed in priority order
        assert_eq!(
            *prober.started.lock().unwrap(),
            *prober.completed.lock().unwrap()
        );
    }

    /// Records how many probes run at once.
    #[derive(Default)]
    struct GaugeProber {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Prober for GaugeProber {
        async fn probe(&self, candidate: &Candidate, _timeout: Duration) -> ProbeResult {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            ProbeResult::failed(
                candidate.clone(),
                Duration::from_millis(10),
                ProbeError::Unreachable {
                    reason: "connection refused".into(),
                },
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_parallelism_caps_in_flight_probes() {
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| candidate(&format!("10.0.0.{}", i), i))
            .collect();
        let prober = Arc::new(GaugeProber::default());

        let sweep = probe_candidates(
            prober.clone(),
            &candidates,
            Duration::from_secs(1),
            NetworkConfig::MAX_PARALLEL_PROBES,
        )
        .await;
        assert!(sweep.winner.is_none());
        assert_eq!(sweep.results.len(), 10);
        assert_eq!(prober.peak.load(Ordering::SeqCst), 4);
        assert_eq!(prober.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failures_have_no_winner() {
        let candidates = three_candidates();
        let prober = ScriptedProber::new()
            .with("10.0.2.2", ProbeOutcome::Unreachable, Duration::from_secs(10))
            .with("192.168.1.50", ProbeOutcome::BadStatus, Duration::from_millis(5))
            .with("localhost", ProbeOutcome::MalformedBody, Duration::from_millis(5));

        let sweep = probe_candidates(Arc::new(prober), &candidates, Duration::from_secs(1), 4).await;
        assert!(sweep.winner.is_none());
        let outcomes: Vec<ProbeOutcome> = sweep.results.iter().map(ProbeResult::outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                ProbeOutcome::Unreachable,
                ProbeOutcome::BadStatus,
                ProbeOutcome::MalformedBody
            ]
        );
    }
}
