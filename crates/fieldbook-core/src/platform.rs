//! Platform signal supplied by the host environment.
//!
//! Only the candidate generator consumes this. The host shell reports which OS
//! it runs on and whether it is an emulator/simulator; nothing here probes the
//! network.

use serde::{Deserialize, Serialize};

/// Environment variable carrying the OS identifier for [`PlatformInfo::from_env`].
pub const PLATFORM_ENV: &str = "FIELDBOOK_PLATFORM";
/// Environment variable carrying the emulator flag for [`PlatformInfo::from_env`].
pub const EMULATOR_ENV: &str = "FIELDBOOK_EMULATOR";

/// Operating system the app shell runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Android,
    Ios,
    Web,
    /// Native desktop build or a developer tool on the backend machine.
    Desktop,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Android => "android",
            Os::Ios => "ios",
            Os::Web => "web",
            Os::Desktop => "desktop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "android" => Some(Os::Android),
            "ios" => Some(Os::Ios),
            "web" | "browser" => Some(Os::Web),
            "desktop" | "linux" | "macos" | "windows" => Some(Os::Desktop),
            _ => None,
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// OS identifier plus emulator-vs-device flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub os: Os,
    /// True for the Android emulator or the iOS simulator.
    pub is_emulator: bool,
}

impl PlatformInfo {
    pub fn new(os: Os, is_emulator: bool) -> Self {
        Self { os, is_emulator }
    }

    pub fn android_emulator() -> Self {
        Self::new(Os::Android, true)
    }

    pub fn ios_simulator() -> Self {
        Self::new(Os::Ios, true)
    }

    pub fn web() -> Self {
        Self::new(Os::Web, false)
    }

    /// Platform of the machine this binary was compiled for.
    pub fn host() -> Self {
        #[cfg(target_os = "android")]
        {
            Self::new(Os::Android, false)
        }
        #[cfg(target_os = "ios")]
        {
            Self::new(Os::Ios, false)
        }
        #[cfg(not(any(target_os = "android", target_os = "ios")))]
        {
            Self::new(Os::Desktop, false)
        }
    }

    /// Read the platform signal from `FIELDBOOK_PLATFORM` / `FIELDBOOK_EMULATOR`,
    /// falling back to [`PlatformInfo::host`] for anything missing or unparseable.
    pub fn from_env() -> Self {
        let host = Self::host();
        let os = std::env::var(PLATFORM_ENV)
            .ok()
            .and_then(|v| Os::parse(&v))
            .unwrap_or(host.os);
        let is_emulator = std::env::var(EMULATOR_ENV)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self { os, is_emulator }
    }
}

impl Default for PlatformInfo {
    fn default() -> Self {
        Self::host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_roundtrip() {
        for os in [Os::Android, Os::Ios, Os::Web, Os::Desktop] {
            assert_eq!(Os::parse(os.as_str()), Some(os));
        }
    }

    #[test]
    fn test_os_parse_aliases() {
        assert_eq!(Os::parse(" Browser "), Some(Os::Web));
        assert_eq!(Os::parse("macos"), Some(Os::Desktop));
        assert_eq!(Os::parse("symbian"), None);
    }

    #[test]
    fn test_platform_serializes_lowercase() {
        let json = serde_json::to_value(PlatformInfo::android_emulator()).unwrap();
        assert_eq!(json["os"], "android");
        assert_eq!(json["is_emulator"], true);
    }
}
