//! Offline dataset provider.
//!
//! A fixed, versioned table of substitute payloads keyed by resource. It is
//! loaded once, shared read-only, and consulted only for reads: a write that
//! cannot reach the backend must fail rather than receive canned success data.

use crate::{ClientError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

const BUNDLED_DATASET: &str = include_str!("dataset.json");

/// Explicit path → resource key routes. Paths not listed here derive their
/// key from their segments (see [`resource_key_for`]).
const ROUTES: &[(&str, &str)] = &[
    ("/api/fields", "fields.all"),
    ("/api/reservations/my", "reservations.mine"),
    ("/api/sports", "sports.all"),
    ("/api/users/me", "profile.me"),
    ("/api/auth/me", "profile.me"),
];

#[derive(Debug, Deserialize)]
struct DatasetFile {
    version: u32,
    resources: HashMap<String, Value>,
}

/// Immutable mapping from resource key to a canned payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineDataset {
    version: u32,
    resources: HashMap<String, Value>,
}

impl OfflineDataset {
    /// Build a dataset from explicit entries.
    pub fn new(version: u32, resources: HashMap<String, Value>) -> Self {
        Self { version, resources }
    }

    /// A dataset with no substitutes.
    pub fn empty() -> Self {
        Self::new(0, HashMap::new())
    }

    /// The dataset compiled into the binary, parsed once per process.
    pub fn bundled() -> Arc<Self> {
        static BUNDLED: OnceLock<Arc<OfflineDataset>> = OnceLock::new();
        BUNDLED
            .get_or_init(|| {
                // The bundled file is covered by tests; an unparseable copy degrades to no substitutes
                let dataset = Self::from_json_str(BUNDLED_DATASET).unwrap_or_else(|e| {
                    tracing::error!("Bundled offline dataset is invalid: {}", e);
                    Self::empty()
                });
                Arc::new(dataset)
            })
            .clone()
    }

    /// Parse a dataset from its JSON form (`{"version": n, "resources": {...}}`).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: DatasetFile = serde_json::from_str(json)?;
        Ok(Self::new(file.version, file.resources))
    }

    /// Load a replacement dataset from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ClientError::io_with_path(e, path))?;
        let dataset = Self::from_json_str(&contents)?;
        tracing::info!(
            "Loaded offline dataset v{} with {} resources from {}",
            dataset.version,
            dataset.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Substitute payload for a resource key.
    pub fn lookup(&self, resource_key: &str) -> Option<&Value> {
        self.resources.get(resource_key)
    }

    pub fn contains(&self, resource_key: &str) -> bool {
        self.resources.contains_key(resource_key)
    }

    /// Resource keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Map a request path to its offline resource key.
///
/// Query strings and trailing slashes are ignored. Routes in the explicit table
/// win; otherwise the segments after `/api/` are joined with dots, so
/// `/api/schedules/today` becomes `schedules.today`.
pub fn resource_key_for(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches('/');

    if let Some((_, key)) = ROUTES.iter().find(|(route, _)| *route == path) {
        return Some((*key).to_string());
    }

    let rest = path.strip_prefix("/api/")?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_bundled_dataset_parses() {
        let dataset = OfflineDataset::bundled();
        assert!(dataset.version() > 0);
        assert!(dataset.contains("fields.all"));
        assert!(dataset.contains("reservations.mine"));

        let reservations = dataset.lookup("reservations.mine").unwrap();
        assert!(!reservations.as_array().unwrap().is_empty());
    }

    #[test]
    fn test_bundled_dataset_is_shared() {
        let a = OfflineDataset::bundled();
        let b = OfflineDataset::bundled();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_lookup_unknown_key() {
        assert!(OfflineDataset::bundled().lookup("payments.all").is_none());
        assert!(OfflineDataset::empty().lookup("fields.all").is_none());
    }

    #[test]
    fn test_resource_key_routes() {
        assert_eq!(resource_key_for("/api/fields").as_deref(), Some("fields.all"));
        assert_eq!(
            resource_key_for("/api/reservations/my?upcoming=true").as_deref(),
            Some("reservations.mine")
        );
        assert_eq!(resource_key_for("/api/fields/").as_deref(), Some("fields.all"));
    }

    #[test]
    fn test_resource_key_derived_from_segments() {
        assert_eq!(
            resource_key_for("/api/schedules/today").as_deref(),
            Some("schedules.today")
        );
        assert_eq!(resource_key_for("/health"), None);
        assert_eq!(resource_key_for("/api/"), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!({"version": 9, "resources": {"fields.all": [{"id": 42}]}})
        )
        .unwrap();

        let dataset = OfflineDataset::from_json_file(file.path()).unwrap();
        assert_eq!(dataset.version(), 9);
        assert_eq!(dataset.keys(), vec!["fields.all"]);
        assert_eq!(dataset.lookup("fields.all"), Some(&json!([{"id": 42}])));
    }

    #[test]
    fn test_malformed_file_is_json_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<html>not a dataset</html>").unwrap();
        assert!(matches!(
            OfflineDataset::from_json_file(file.path()),
            Err(ClientError::Json { .. })
        ));
    }
}
