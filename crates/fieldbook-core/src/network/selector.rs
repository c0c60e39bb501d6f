//! Endpoint selector and cache.
//!
//! Owns the single cached [`ResolvedEndpoint`] and the probing cycle that
//! produces it:
//!
//! - UNRESOLVED: nothing cached; the next `resolve()` starts a cycle
//! - PROBING: one cycle in flight; every caller awaits the same result
//! - RESOLVED: a winner is cached until failures reach the threshold
//!
//! A cycle runs as its own task so a caller that stops waiting does not abort
//! resolution for everybody else.

use crate::config::ResolverConfig;
use crate::error::ResolutionError;
use crate::network::candidates::{self, Candidate};
use crate::network::probe::{probe_candidates, DynProber, ProbeResult};
use crate::platform::PlatformInfo;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// The cached winner of a probing cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEndpoint {
    pub candidate: Candidate,
    pub resolved_at: DateTime<Utc>,
    /// Reset to 0 by any successful request.
    pub consecutive_failures: u32,
    /// Health probe latency of the winning candidate.
    pub latency_ms: u64,
}

impl ResolvedEndpoint {
    fn from_probe(probe: ProbeResult, carried_failures: u32) -> Self {
        Self {
            candidate: probe.candidate,
            resolved_at: Utc::now(),
            consecutive_failures: carried_failures,
            latency_ms: probe.latency_ms,
        }
    }
}

/// Externally visible selector phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorPhase {
    Unresolved,
    Probing,
    Resolved,
}

impl std::fmt::Display for SelectorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorPhase::Unresolved => write!(f, "unresolved"),
            SelectorPhase::Probing => write!(f, "probing"),
            SelectorPhase::Resolved => write!(f, "resolved"),
        }
    }
}

/// Diagnostic snapshot of the selector.
#[derive(Debug, Clone, Serialize)]
pub struct SelectorStatus {
    pub phase: SelectorPhase,
    pub endpoint: Option<ResolvedEndpoint>,
    pub last_error: Option<String>,
    pub cycles_started: u64,
    pub last_sweep: Vec<ProbeResult>,
    pub monitoring_active: bool,
}

type SharedResolution = Shared<BoxFuture<'static, Result<ResolvedEndpoint, ResolutionError>>>;

enum SelectorState {
    Unresolved {
        last_error: Option<ResolutionError>,
    },
    Probing {
        cycle: u64,
        result: SharedResolution,
    },
    Resolved(ResolvedEndpoint),
}

struct SelectorInner {
    config: ResolverConfig,
    platform: PlatformInfo,
    prober: DynProber,
    state: Mutex<SelectorState>,
    cycles: AtomicU64,
    last_sweep: Mutex<Vec<ProbeResult>>,
    monitoring_active: AtomicBool,
    /// Bumped on every start/stop; a loop from an older generation exits.
    monitor_generation: AtomicU64,
}

impl SelectorInner {
    fn lock_state(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_cycle(
        self: Arc<Self>,
        cycle: u64,
        carry: Option<(Candidate, u32)>,
    ) -> Result<ResolvedEndpoint, ResolutionError> {
        let candidates = candidates::generate(&self.platform, &self.config);
        let attempted = candidates.len();
        debug!(
            "Resolution cycle {} probing {} candidates for {}",
            cycle, attempted, self.platform.os
        );

        let sweep = tokio::time::timeout(
            self.config.resolve_deadline,
            probe_candidates(
                Arc::clone(&self.prober),
                &candidates,
                self.config.probe_timeout,
                self.config.max_parallel_probes,
            ),
        )
        .await;

        let result = match sweep {
            Ok(sweep) => {
                let winner = sweep.winner.clone();
                *self.last_sweep.lock().unwrap_or_else(|e| e.into_inner()) = sweep.results;
                match winner {
                    Some(probe) => {
                        let carried = carry
                            .filter(|(previous, _)| previous.same_address(&probe.candidate))
                            .map(|(_, failures)| failures)
                            .unwrap_or(0);
                        Ok(ResolvedEndpoint::from_probe(probe, carried))
                    }
                    None => Err(ResolutionError::Unresolved { attempted }),
                }
            }
            Err(_) => Err(ResolutionError::DeadlineExceeded(self.config.resolve_deadline)),
        };

        let mut state = self.lock_state();
        if matches!(&*state, SelectorState::Probing { cycle: c, .. } if *c == cycle) {
            *state = match &result {
                Ok(endpoint) => {
                    info!(
                        "Resolved backend endpoint {} ({:?}, {}ms)",
                        endpoint.candidate, endpoint.candidate.source, endpoint.latency_ms
                    );
                    SelectorState::Resolved(endpoint.clone())
                }
                Err(e) => {
                    warn!("Backend endpoint unresolved: {}", e);
                    SelectorState::Unresolved {
                        last_error: Some(e.clone()),
                    }
                }
            };
        }
        result
    }
}

/// Resolves and caches the backend endpoint. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EndpointSelector {
    inner: Arc<SelectorInner>,
}

impl EndpointSelector {
    pub fn new(config: ResolverConfig, platform: PlatformInfo, prober: DynProber) -> Self {
        Self {
            inner: Arc::new(SelectorInner {
                config,
                platform,
                prober,
                state: Mutex::new(SelectorState::Unresolved { last_error: None }),
                cycles: AtomicU64::new(0),
                last_sweep: Mutex::new(Vec::new()),
                monitoring_active: AtomicBool::new(false),
                monitor_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    pub fn platform(&self) -> PlatformInfo {
        self.inner.platform
    }

    /// Return the cached endpoint, or join/start a probing cycle.
    ///
    /// Single-flight: concurrent callers share one cycle.
    pub async fn resolve(&self) -> Result<ResolvedEndpoint, ResolutionError> {
        let pending = {
            let mut state = self.inner.lock_state();
            match &*state {
                SelectorState::Resolved(endpoint) => return Ok(endpoint.clone()),
                SelectorState::Probing { result, .. } => result.clone(),
                SelectorState::Unresolved { .. } => self.start_cycle(&mut state, None),
            }
        };
        pending.await
    }

    /// Force re-resolution, joining a cycle that is already running.
    ///
    /// If the previously cached candidate wins again it keeps its failure
    /// count, so repeated transport failures still reach the threshold.
    pub async fn refresh(&self) -> Result<ResolvedEndpoint, ResolutionError> {
        let pending = {
            let mut state = self.inner.lock_state();
            match &*state {
                SelectorState::Probing { result, .. } => result.clone(),
                SelectorState::Resolved(endpoint) => {
                    debug!("Forcing re-resolution away from {}", endpoint.candidate);
                    let carry = (endpoint.candidate.clone(), endpoint.consecutive_failures);
                    self.start_cycle(&mut state, Some(carry))
                }
                SelectorState::Unresolved { .. } => self.start_cycle(&mut state, None),
            }
        };
        pending.await
    }

    fn start_cycle(
        &self,
        state: &mut SelectorState,
        carry: Option<(Candidate, u32)>,
    ) -> SharedResolution {
        let cycle = self.inner.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(inner.run_cycle(cycle, carry));
        let result = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(ResolutionError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        *state = SelectorState::Probing {
            cycle,
            result: result.clone(),
        };
        result
    }

    /// Record the outcome of a real request made against `candidate`.
    ///
    /// Success resets the failure count. Failures increment it, and once it
    /// reaches `failure_threshold` the cache entry is discarded. Reports about
    /// a candidate that is no longer cached are ignored.
    pub fn report_outcome(&self, candidate: &Candidate, success: bool) {
        let mut state = self.inner.lock_state();
        let SelectorState::Resolved(endpoint) = &mut *state else {
            return;
        };
        if !endpoint.candidate.same_address(candidate) {
            return;
        }

        if success {
            endpoint.consecutive_failures = 0;
            return;
        }

        endpoint.consecutive_failures += 1;
        let failures = endpoint.consecutive_failures;
        if failures >= self.inner.config.failure_threshold {
            warn!(
                "Dropping cached endpoint {} after {} consecutive failures",
                candidate, failures
            );
            *state = SelectorState::Unresolved { last_error: None };
        } else {
            debug!(
                "Endpoint {} failure {}/{}",
                candidate, failures, self.inner.config.failure_threshold
            );
        }
    }

    /// Discard the cached endpoint. An in-flight cycle is left running.
    pub fn invalidate(&self) {
        let mut state = self.inner.lock_state();
        if let SelectorState::Resolved(endpoint) = &*state {
            info!("Invalidating cached endpoint {}", endpoint.candidate);
            *state = SelectorState::Unresolved { last_error: None };
        }
    }

    pub fn phase(&self) -> SelectorPhase {
        match &*self.inner.lock_state() {
            SelectorState::Unresolved { .. } => SelectorPhase::Unresolved,
            SelectorState::Probing { .. } => SelectorPhase::Probing,
            SelectorState::Resolved(_) => SelectorPhase::Resolved,
        }
    }

    /// Currently cached endpoint, without triggering resolution.
    pub fn current(&self) -> Option<ResolvedEndpoint> {
        match &*self.inner.lock_state() {
            SelectorState::Resolved(endpoint) => Some(endpoint.clone()),
            _ => None,
        }
    }

    /// Number of probing cycles started so far.
    pub fn cycles_started(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SelectorStatus {
        let (phase, endpoint, last_error) = match &*self.inner.lock_state() {
            SelectorState::Unresolved { last_error } => (
                SelectorPhase::Unresolved,
                None,
                last_error.as_ref().map(ToString::to_string),
            ),
            SelectorState::Probing { .. } => (SelectorPhase::Probing, None, None),
            SelectorState::Resolved(endpoint) => {
                (SelectorPhase::Resolved, Some(endpoint.clone()), None)
            }
        };
        SelectorStatus {
            phase,
            endpoint,
            last_error,
            cycles_started: self.cycles_started(),
            last_sweep: self
                .inner
                .last_sweep
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            monitoring_active: self.is_monitoring(),
        }
    }

    // === Background Monitoring ===

    /// Start re-attempting resolution every `monitor_interval` while unresolved.
    pub fn start_monitoring(&self) {
        if self.inner.monitoring_active.swap(true, Ordering::SeqCst) {
            debug!("Endpoint monitoring already active");
            return;
        }

        let generation = self.inner.monitor_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let selector = self.clone();
        let interval = self.inner.config.monitor_interval;
        tokio::spawn(async move {
            info!("Starting endpoint monitoring every {:?}", interval);
            while selector.monitor_current(generation) {
                tokio::time::sleep(interval).await;
                if !selector.monitor_current(generation) {
                    break;
                }
                if selector.phase() == SelectorPhase::Unresolved {
                    debug!("Background re-resolution attempt");
                    let _ = selector.resolve().await;
                }
            }
            info!("Endpoint monitoring stopped");
        });
    }

    pub fn stop_monitoring(&self) {
        self.inner.monitoring_active.store(false, Ordering::SeqCst);
        self.inner.monitor_generation.fetch_add(1, Ordering::SeqCst);
    }

    fn monitor_current(&self, generation: u64) -> bool {
        self.inner.monitoring_active.load(Ordering::SeqCst)
            && self.inner.monitor_generation.load(Ordering::SeqCst) == generation
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.monitoring_active.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for EndpointSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointSelector")
            .field("platform", &self.inner.platform)
            .field("phase", &self.phase())
            .finish()
    }
}
