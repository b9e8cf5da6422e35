//! State store - last-applied resource state keyed by logical name

use crate::error::{Error, Result};
use crate::reference::resolve_properties;
use crate::types::{Properties, ResourceRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Current on-disk snapshot format
pub const STATE_VERSION: u32 = 1;

/// Everything known about a stack after the last apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Applied resources by logical name
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    /// Stack exports, resolved
    #[serde(default)]
    pub outputs: Properties,
    pub last_updated: DateTime<Utc>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
            outputs: Properties::new(),
            last_updated: Utc::now(),
        }
    }
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<&ResourceRecord> {
        self.resources.get(name)
    }

    /// Insert or replace a record
    pub fn record(&mut self, record: ResourceRecord) {
        self.resources.insert(record.name.clone(), record);
        self.last_updated = Utc::now();
    }

    /// Forget a resource
    pub fn remove(&mut self, name: &str) -> Option<ResourceRecord> {
        let removed = self.resources.remove(name);
        if removed.is_some() {
            self.last_updated = Utc::now();
        }
        removed
    }

    /// Outputs of an applied resource
    pub fn outputs_of(&self, name: &str) -> Option<&Properties> {
        self.resources.get(name).map(|r| &r.outputs)
    }

    /// Replace the stack exports
    pub fn set_outputs(&mut self, outputs: Properties) {
        self.outputs = outputs;
        self.last_updated = Utc::now();
    }

    /// Resolve stack exports against applied outputs
    ///
    /// Exports may reference any recorded resource, e.g.
    /// `"user_pool_id": "${user_pool.id}"`.
    pub fn resolve_exports(&self, exports: &Properties) -> Result<Properties> {
        resolve_properties("<exports>", exports, |name| self.outputs_of(name))
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }
}

/// Persistence for snapshots
pub trait StateStore {
    /// Load the last saved snapshot, or an empty one
    fn load(&self) -> Result<Snapshot>;

    /// Persist a snapshot
    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// In-memory store, mostly for tests and previews
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Snapshot,
    saves: usize,
}

impl MemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot, saves: 0 }
    }

    /// Number of times `save` was called
    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.snapshot = snapshot.clone();
        self.saves += 1;
        Ok(())
    }
}

/// JSON file store, one file per stack
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store for `<dir>/<stack>.json`
    pub fn for_stack(dir: impl AsRef<Path>, stack: &str) -> Self {
        Self::new(dir.as_ref().join(format!("{stack}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::StateIo {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for FileStore {
    fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            log::debug!("State file does not exist, using empty state");
            return Ok(Snapshot::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;

        if snapshot.version != STATE_VERSION {
            return Err(Error::StateVersion {
                path: self.path.clone(),
                found: snapshot.version,
                expected: STATE_VERSION,
            });
        }

        log::debug!(
            "Loaded state from {} ({} resources)",
            self.path.display(),
            snapshot.len()
        );
        Ok(snapshot)
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let content = serde_json::to_string_pretty(snapshot)?;

        // Write-then-rename
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(name: &str) -> ResourceRecord {
        ResourceRecord {
            name: name.to_string(),
            resource_type: "test".to_string(),
            declared: Properties::new(),
            inputs: Properties::new(),
            outputs: serde_json::from_value(json!({ "id": format!("{name}-id") })).unwrap(),
            dependencies: Vec::new(),
            protect: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::for_stack(dir.path(), "dev");
        let snapshot = store.load().unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.version, STATE_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::for_stack(dir.path().join("nested"), "dev");

        let mut snapshot = Snapshot::default();
        snapshot.record(record("pool"));
        snapshot.set_outputs(serde_json::from_value(json!({ "user_pool_id": "pool-id" })).unwrap());
        store.save(&snapshot).unwrap();

        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.outputs_of("pool").unwrap()["id"], json!("pool-id"));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::for_stack(dir.path(), "dev");
        let snapshot = Snapshot {
            version: 99,
            ..Snapshot::default()
        };
        store.save(&snapshot).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::StateVersion { found: 99, .. }));
    }

    #[test]
    fn test_resolve_exports() {
        let mut snapshot = Snapshot::default();
        snapshot.record(record("pool"));

        let exports: Properties = serde_json::from_value(json!({
            "user_pool_id": "${pool.id}",
            "label": "pool is ${pool.id}",
        }))
        .unwrap();
        let resolved = snapshot.resolve_exports(&exports).unwrap();
        assert_eq!(resolved["user_pool_id"], json!("pool-id"));
        assert_eq!(resolved["label"], json!("pool is pool-id"));

        let missing: Properties =
            serde_json::from_value(json!({ "api": "${api.uri}" })).unwrap();
        let err = snapshot.resolve_exports(&missing).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let mut store = MemoryStore::default();
        let mut snapshot = store.load().unwrap();
        snapshot.record(record("a"));
        store.save(&snapshot).unwrap();
        snapshot.remove("a");
        store.save(&snapshot).unwrap();

        assert_eq!(store.saves(), 2);
        assert!(store.snapshot().is_empty());
    }
}
