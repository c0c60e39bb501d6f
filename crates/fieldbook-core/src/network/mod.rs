//! Endpoint discovery and resilient requests.
//!
//! This module provides:
//! - Candidate generation from platform metadata and configuration
//! - Bounded-time health probing with bounded parallelism
//! - A single-flight endpoint selector with failure-driven invalidation
//! - The resilient request client with retry and offline fallback

mod candidates;
mod client;
mod probe;
mod response;
mod selector;

pub use candidates::{generate as generate_candidates, Candidate, CandidateSource};
pub use client::{classify_response, is_server_error, ResilientClient};
pub use probe::{
    classify_health, probe_candidates, DynProber, HttpProber, ProbeError, ProbeOutcome,
    ProbeResult, ProbeSweep, Prober,
};
pub use response::{inspect as inspect_body, BodyShape};
pub use selector::{EndpointSelector, ResolvedEndpoint, SelectorPhase, SelectorStatus};
