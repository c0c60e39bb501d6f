//! Candidate generation.
//!
//! Turns platform metadata plus [`ResolverConfig`] into an ordered list of
//! addresses the backend might be listening on. Pure: no I/O, no shared state.

use crate::config::{NetworkConfig, ResolverConfig};
use crate::platform::{Os, PlatformInfo};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::{Host, Url};

/// Why a candidate is in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    ManualOverride,
    EmulatorAlias,
    SimulatorLoopback,
    Lan,
    Fallback,
}

/// One address the backend might be reachable at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    /// Ordinal rank, 0 is tried first.
    pub priority: u32,
    pub source: CandidateSource,
}

impl Candidate {
    /// `scheme://host:port` without a trailing slash.
    pub fn base_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            // Bare IPv6 literal
            format!("{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }

    /// Absolute URL for a path on this candidate.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url(), path)
        } else {
            format!("{}/{}", self.base_url(), path)
        }
    }

    /// Same scheme, host and port, ignoring rank and provenance.
    pub fn same_address(&self, other: &Candidate) -> bool {
        self.scheme == other.scheme && self.host == other.host && self.port == other.port
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base_url())
    }
}

/// Generate the ordered candidate list for a platform.
///
/// Order: manual override, platform alias (Android emulator / iOS simulator),
/// configured LAN hosts, fallback host. Duplicate addresses keep their first
/// position. The result is never empty.
pub fn generate(platform: &PlatformInfo, config: &ResolverConfig) -> Vec<Candidate> {
    let mut entries: Vec<(String, CandidateSource)> = Vec::new();

    if let Some(host) = config.override_host.as_deref() {
        entries.push((host.to_string(), CandidateSource::ManualOverride));
    }

    match (platform.os, platform.is_emulator) {
        (Os::Android, true) => entries.push((
            NetworkConfig::ANDROID_EMULATOR_HOST.to_string(),
            CandidateSource::EmulatorAlias,
        )),
        (Os::Ios, true) => entries.push((
            NetworkConfig::IOS_SIMULATOR_HOST.to_string(),
            CandidateSource::SimulatorLoopback,
        )),
        _ => {}
    }

    entries.extend(
        config
            .lan_hosts
            .iter()
            .map(|host| (host.clone(), CandidateSource::Lan)),
    );
    entries.push((config.fallback_host.clone(), CandidateSource::Fallback));

    let mut candidates: Vec<Candidate> = Vec::with_capacity(entries.len());
    for (entry, source) in entries {
        let Some((scheme, host, port)) = parse_address(&entry, &config.scheme, config.port)
        else {
            warn!("Ignoring malformed backend address {:?}", entry);
            continue;
        };
        let candidate = Candidate {
            host,
            port,
            scheme,
            priority: candidates.len() as u32,
            source,
        };
        if candidates.iter().any(|c| c.same_address(&candidate)) {
            continue;
        }
        candidates.push(candidate);
    }

    if candidates.is_empty() {
        candidates.push(Candidate {
            host: NetworkConfig::FALLBACK_HOST.to_string(),
            port: config.port,
            scheme: config.scheme.clone(),
            priority: 0,
            source: CandidateSource::Fallback,
        });
    }

    candidates
}

/// Parse a configured address into `(scheme, host, port)`.
///
/// Accepts `host`, `host:port`, `[v6]:port`, a bare IPv6 literal or a full
/// `scheme://host[:port][/path]` URL. An explicit scheme is kept, and its
/// well-known port applies when none is given; entries without a scheme use
/// `default_scheme` and `default_port`. Only http and https are accepted.
fn parse_address(
    entry: &str,
    default_scheme: &str,
    default_port: u16,
) -> Option<(String, String, u16)> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }

    let explicit_scheme = entry.contains("://");
    let raw = if explicit_scheme {
        entry.to_string()
    } else if entry.matches(':').count() > 1 && !entry.starts_with('[') {
        // Bare IPv6 literal without a port
        format!("{}://[{}]", default_scheme, entry)
    } else {
        format!("{}://{}", default_scheme, entry)
    };

    let url = Url::parse(&raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = match url.host()? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => addr.to_string(),
    };
    if host.is_empty() {
        return None;
    }
    let port = match url.port() {
        Some(port) => port,
        // Url drops a port equal to the scheme default
        None if explicit_scheme || authority_has_port(&raw) => url.port_or_known_default()?,
        None => default_port,
    };
    Some((url.scheme().to_string(), host, port))
}

/// Whether the authority of `scheme://authority/...` spells out a port.
fn authority_has_port(raw: &str) -> bool {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            (!host.contains(':') || host.ends_with(']'))
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(candidates: &[Candidate]) -> Vec<String> {
        candidates
            .iter()
            .map(|c| format!("{}:{}", c.host, c.port))
            .collect()
    }

    fn all_platforms() -> Vec<PlatformInfo> {
        let mut platforms = Vec::new();
        for os in [Os::Android, Os::Ios, Os::Web, Os::Desktop] {
            for is_emulator in [false, true] {
                platforms.push(PlatformInfo::new(os, is_emulator));
            }
        }
        platforms
    }

    #[test]
    fn test_android_emulator_order() {
        let config = ResolverConfig::new().with_lan_host("192.168.1.50");
        let candidates = generate(&PlatformInfo::android_emulator(), &config);
        assert_eq!(
            hosts(&candidates),
            vec!["10.0.2.2:5000", "192.168.1.50:5000", "localhost:5000"]
        );
        assert_eq!(candidates[0].source, CandidateSource::EmulatorAlias);
        assert_eq!(candidates[2].source, CandidateSource::Fallback);
    }

    #[test]
    fn test_ios_simulator_uses_loopback() {
        let candidates = generate(&PlatformInfo::ios_simulator(), &ResolverConfig::new());
        assert_eq!(hosts(&candidates), vec!["127.0.0.1:5000", "localhost:5000"]);
    }

    #[test]
    fn test_physical_device_skips_aliases() {
        let config = ResolverConfig::new().with_lan_host("192.168.0.12:8080");
        let candidates = generate(&PlatformInfo::new(Os::Android, false), &config);
        assert_eq!(hosts(&candidates), vec!["192.168.0.12:8080", "localhost:5000"]);
    }

    #[test]
    fn test_override_is_always_first() {
        for platform in all_platforms() {
            let config = ResolverConfig::new()
                .with_override_host("10.1.1.9:7000")
                .with_lan_host("192.168.1.50");
            let candidates = generate(&platform, &config);
            assert_eq!(candidates[0].host, "10.1.1.9");
            assert_eq!(candidates[0].port, 7000);
            assert_eq!(candidates[0].priority, 0);
            assert_eq!(candidates[0].source, CandidateSource::ManualOverride);
        }
    }

    #[test]
    fn test_always_non_empty_and_ordered() {
        for platform in all_platforms() {
            let candidates = generate(&platform, &ResolverConfig::new());
            assert!(!candidates.is_empty());
            for (index, candidate) in candidates.iter().enumerate() {
                assert_eq!(candidate.priority, index as u32);
            }
        }
    }

    #[test]
    fn test_malformed_entries_fall_back_to_localhost() {
        let mut config = ResolverConfig::new().with_fallback_host("");
        config.override_host = Some("host:notaport".into());
        let candidates = generate(&PlatformInfo::web(), &config);
        assert_eq!(hosts(&candidates), vec!["localhost:5000"]);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let config = ResolverConfig::new()
            .with_override_host("localhost")
            .with_lan_host("localhost:5000");
        let candidates = generate(&PlatformInfo::web(), &config);
        assert_eq!(hosts(&candidates), vec!["localhost:5000"]);
        assert_eq!(candidates[0].source, CandidateSource::ManualOverride);
    }

    #[test]
    fn test_parse_address_variants() {
        let parse = |entry| parse_address(entry, "http", 5000);
        assert_eq!(
            parse("http://192.168.1.50:8000/api"),
            Some(("http".into(), "192.168.1.50".into(), 8000))
        );
        assert_eq!(parse("[::1]:9000"), Some(("http".into(), "::1".into(), 9000)));
        assert_eq!(parse("fe80::1"), Some(("http".into(), "fe80::1".into(), 5000)));
        assert_eq!(parse("LocalHost"), Some(("http".into(), "localhost".into(), 5000)));
        assert_eq!(parse("localhost:80"), Some(("http".into(), "localhost".into(), 80)));
        assert_eq!(parse("[::1]"), Some(("http".into(), "::1".into(), 5000)));
        assert_eq!(parse("  "), None);
        assert_eq!(parse(":5000"), None);
        assert_eq!(parse("host:notaport"), None);
        assert_eq!(parse("ftp://files.example"), None);
    }

    #[test]
    fn test_override_keeps_its_own_scheme() {
        let config = ResolverConfig::new().with_override_host("https://api.fieldbook.example");
        let candidates = generate(&PlatformInfo::web(), &config);
        assert_eq!(candidates[0].scheme, "https");
        assert_eq!(candidates[0].port, 443);
        assert_eq!(candidates[0].base_url(), "https://api.fieldbook.example:443");

        let config = ResolverConfig::new().with_override_host("https://api.fieldbook.example:8443/");
        let candidates = generate(&PlatformInfo::web(), &config);
        assert_eq!(candidates[0].base_url(), "https://api.fieldbook.example:8443");
        // The fallback still uses the configured scheme
        assert_eq!(candidates[1].scheme, "http");
        assert_eq!(candidates[1].port, 5000);
    }

    #[test]
    fn test_candidate_urls() {
        let candidate = Candidate {
            host: "::1".into(),
            port: 5000,
            scheme: "http".into(),
            priority: 0,
            source: CandidateSource::Lan,
        };
        assert_eq!(candidate.base_url(), "http://[::1]:5000");
        assert_eq!(candidate.url("/api/health"), "http://[::1]:5000/api/health");
        assert_eq!(candidate.url("api/fields"), "http://[::1]:5000/api/fields");
    }
}
