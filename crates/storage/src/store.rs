//! Key-value stores

use crate::StorageError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Whole-store contents
pub type Mapping = BTreeMap<String, Value>;

/// Load/save of a complete mapping
pub trait KeyValueStore: Send + Sync {
    fn load(&self) -> Result<Mapping, StorageError>;
    fn save(&self, mapping: &Mapping) -> Result<(), StorageError>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Mapping>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self) -> Result<Mapping, StorageError> {
        let data = self
            .data
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        Ok(data.clone())
    }

    fn save(&self, mapping: &Mapping) -> Result<(), StorageError> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        *data = mapping.clone();
        Ok(())
    }
}

/// JSON document on disk. A missing file loads as an empty mapping.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Using JSON store at {}", path.display());
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self) -> Result<Mapping, StorageError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet", self.path.display());
                return Ok(Mapping::new());
            }
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Mapping::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, mapping: &Mapping) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(mapping)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Saved {} keys to {}", mapping.len(), self.path.display());
        Ok(())
    }
}
