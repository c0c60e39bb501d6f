//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fieldbook")]
#[command(about = "Inspect Fieldbook backend resolution and issue requests through the resilient client")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Resolver config file (defaults to <config dir>/fieldbook/resolver.json when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Manual backend address, tried before anything else
    #[arg(long, global = true)]
    pub override_host: Option<String>,

    /// Additional LAN backend address (repeatable)
    #[arg(long = "lan-host", global = true)]
    pub lan_hosts: Vec<String>,

    /// Platform to resolve for: android, ios, web or desktop
    #[arg(long, global = true)]
    pub platform: Option<String>,

    /// Treat the platform as an emulator or simulator
    #[arg(long, global = true)]
    pub emulator: bool,

    /// Serve reads from the offline dataset without touching the network
    #[arg(long, global = true)]
    pub offline: bool,

    /// Bearer token for authenticated requests
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the ordered candidate list
    Candidates,
    /// Health-probe every candidate and report each outcome
    Probe,
    /// Run endpoint resolution and print the winner
    Resolve,
    /// Issue one request through the resilient client
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,
        /// API path, e.g. /api/reservations/my
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
        /// Send the stored bearer token
        #[arg(long)]
        auth: bool,
        /// Offline resource key, when it differs from the path-derived one
        #[arg(long)]
        resource: Option<String>,
    },
    /// Show the offline dataset in use
    Dataset,
}
