//! Resolver configuration and platform signal for the CLI.
//!
//! Precedence: command-line flags, then the config file, then library defaults.
//! The platform falls back to `FIELDBOOK_PLATFORM` / `FIELDBOOK_EMULATOR`.

use crate::cli::GlobalOpts;
use anyhow::{bail, Context, Result};
use fieldbook_core::{Os, PlatformInfo, ResolverConfig};
use std::path::PathBuf;
use tracing::debug;

/// Default config location: `<config dir>/fieldbook/resolver.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fieldbook").join("resolver.json"))
}

pub fn load_config(opts: &GlobalOpts) -> Result<ResolverConfig> {
    let path = match &opts.config {
        Some(path) => Some(path.clone()),
        None => default_config_path().filter(|path| path.exists()),
    };

    let mut config = match path {
        Some(path) => {
            debug!("Loading resolver config from {}", path.display());
            ResolverConfig::from_json_file(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => ResolverConfig::new(),
    };

    apply_overrides(&mut config, opts);
    config.validate().context("Invalid resolver configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut ResolverConfig, opts: &GlobalOpts) {
    if let Some(host) = &opts.override_host {
        config.override_host = Some(host.clone());
    }
    config.lan_hosts.extend(opts.lan_hosts.iter().cloned());
    if opts.offline {
        config.offline_mode = true;
    }
}

pub fn platform(opts: &GlobalOpts) -> Result<PlatformInfo> {
    let from_env = PlatformInfo::from_env();
    let os = match &opts.platform {
        Some(name) => match Os::parse(name) {
            Some(os) => os,
            None => bail!("Unknown platform '{}' (expected android, ios, web or desktop)", name),
        },
        None => from_env.os,
    };
    let is_emulator = opts.emulator || (opts.platform.is_none() && from_env.is_emulator);
    Ok(PlatformInfo::new(os, is_emulator))
}
