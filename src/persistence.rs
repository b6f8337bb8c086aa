//! Artifact stores for run records and fitted models

use crate::error::{AutoMLError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Write-once storage for serialized run outputs
pub trait ArtifactStore: Send + Sync {
    /// Store raw bytes under `name`, returning where they landed
    fn save_artifact(&self, name: &str, bytes: &[u8]) -> Result<String>;

    /// Store a JSON record under `name`
    fn save_record(&self, name: &str, record: &serde_json::Value) -> Result<String> {
        let bytes = serde_json::to_vec_pretty(record)?;
        self.save_artifact(name, &bytes)
    }
}

fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(AutoMLError::ValidationError(format!(
            "invalid artifact name '{}'",
            name
        )))
    }
}

fn already_exists(name: &str) -> AutoMLError {
    AutoMLError::ValidationError(format!("artifact '{}' already exists", name))
}

/// Process-local store handing out shared snapshots
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Arc<RwLock<BTreeMap<String, Arc<[u8]>>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        self.artifacts.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.artifacts.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn save_artifact(&self, name: &str, bytes: &[u8]) -> Result<String> {
        check_name(name)?;
        let mut artifacts = self.artifacts.write();
        if artifacts.contains_key(name) {
            return Err(already_exists(name));
        }
        artifacts.insert(name.to_string(), Arc::from(bytes));
        Ok(format!("memory://{}", name))
    }
}

/// Files under a base directory, one per artifact
#[derive(Debug, Clone)]
pub struct DirectoryArtifactStore {
    base_dir: PathBuf,
}

impl DirectoryArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &std::path::Path {
        &self.base_dir
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        check_name(name)?;
        Ok(fs::read(self.base_dir.join(name))?)
    }
}

impl ArtifactStore for DirectoryArtifactStore {
    fn save_artifact(&self, name: &str, bytes: &[u8]) -> Result<String> {
        check_name(name)?;
        let path = self.base_dir.join(name);
        // create_new refuses to overwrite
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => already_exists(name),
                _ => AutoMLError::IoError(e),
            })?;
        std::io::Write::write_all(&mut file, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Artifact written");
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_is_write_once() {
        let store = InMemoryArtifactStore::new();
        let path = store.save_artifact("model.json", b"{}").unwrap();
        assert_eq!(path, "memory://model.json");
        assert_eq!(store.get("model.json").as_deref(), Some(&b"{}"[..]));
        assert!(store.save_artifact("model.json", b"[]").is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_record_is_pretty_json() {
        let store = InMemoryArtifactStore::new();
        store
            .save_record("result.json", &serde_json::json!({"best": "decision_tree"}))
            .unwrap();
        let bytes = store.get("result.json").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["best"], "decision_tree");
    }

    #[test]
    fn test_names_are_checked() {
        let store = InMemoryArtifactStore::new();
        assert!(store.save_artifact("../escape", b"x").is_err());
        assert!(store.save_artifact("", b"x").is_err());
        assert!(store.save_artifact("a/b", b"x").is_err());
    }

    #[test]
    fn test_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryArtifactStore::new(dir.path().join("run")).unwrap();
        let path = store.save_artifact("profile.json", b"{\"rows\": 3}").unwrap();
        assert!(path.ends_with("profile.json"));
        assert_eq!(store.read("profile.json").unwrap(), b"{\"rows\": 3}");
        assert!(store.save_artifact("profile.json", b"{}").is_err());
    }
}
