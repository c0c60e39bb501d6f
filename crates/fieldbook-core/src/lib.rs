//! Fieldbook Core - connectivity layer for the Fieldbook reservation app.
//!
//! Finds which of several candidate backend addresses is reachable from the
//! current platform, routes every request through a single resilient client,
//! and serves a bundled offline dataset for reads when the backend cannot.
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldbook_core::{ClientBuilder, Payload, PlatformInfo, RequestDescriptor, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> fieldbook_core::Result<()> {
//!     let client = ClientBuilder::new(ResolverConfig::new().with_lan_host("192.168.1.50"))
//!         .with_platform(PlatformInfo::android_emulator())
//!         .with_token("session-token")
//!         .build()?;
//!
//!     let request = RequestDescriptor::get("/api/reservations/my").authenticated();
//!     match client.execute(&request).await? {
//!         Payload::Live(data) => println!("live: {}", data),
//!         Payload::Offline(data) => println!("offline copy: {}", data),
//!         Payload::Empty => println!("no reservations"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cancel;
pub mod config;
pub mod error;
pub mod network;
pub mod offline;
pub mod platform;
pub mod request;

mod builder;

// Re-export commonly used types
pub use auth::TokenStore;
pub use builder::ClientBuilder;
pub use cancel::{CancellationToken, CancelledError};
pub use config::{NetworkConfig, ResolverConfig};
pub use error::{ClientError, ResolutionError, Result};
pub use network::{
    Candidate, CandidateSource, EndpointSelector, HttpProber, ProbeOutcome, ProbeResult, Prober,
    ResilientClient, ResolvedEndpoint, SelectorPhase, SelectorStatus,
};
pub use offline::{resource_key_for, OfflineDataset};
pub use platform::{Os, PlatformInfo};
pub use request::{HttpMethod, Payload, RequestDescriptor};
