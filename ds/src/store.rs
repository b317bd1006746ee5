//! Core DataStore implementation

use eyre::{Context, Result, eyre};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Minimal get/set persistence interface
///
/// Values are opaque JSON. `get` returns `None` when the key was never set.
pub trait KeyValueStore: Send + Sync {
    /// Look up a key
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value under a key, replacing any previous value
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Key-value store backed by a single JSON object file
#[derive(Debug, Clone)]
pub struct DataStore {
    path: PathBuf,
}

impl DataStore {
    /// Open (or prepare to create) a store at the given file path
    ///
    /// The file itself is only created on the first `set`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "DataStore::open: called");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create store directory")?;
        }

        Ok(Self { path })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List all keys in the store
    pub fn keys(&self) -> Result<Vec<String>> {
        debug!(path = ?self.path, "DataStore::keys: called");
        let data = self.load()?;
        let mut keys: Vec<String> = data.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Remove a key, returning whether it existed
    pub fn delete(&self, key: &str) -> Result<bool> {
        debug!(%key, "DataStore::delete: called");
        let mut data = self.load()?;
        let existed = data.remove(key).is_some();
        if existed {
            self.save(&data)?;
            info!(%key, "Deleted key");
        }
        Ok(existed)
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            debug!(path = ?self.path, "DataStore::load: file missing, empty store");
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)
            .context(format!("Failed to read store file {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content)
            .context(format!("Failed to parse store file {}", self.path.display()))?
        {
            Value::Object(map) => Ok(map),
            other => Err(eyre!("Store file does not hold a JSON object (found {})", type_name(&other))),
        }
    }

    fn save(&self, data: &Map<String, Value>) -> Result<()> {
        let content = serde_json::to_string(data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).context("Failed to write store file")?;
        fs::rename(&tmp, &self.path).context("Failed to replace store file")?;
        debug!(path = ?self.path, keys = data.len(), "DataStore::save: written");
        Ok(())
    }
}

impl KeyValueStore for DataStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        debug!(%key, "DataStore::get: called");
        let mut data = self.load()?;
        Ok(data.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        debug!(%key, "DataStore::set: called");
        let mut data = self.load()?;
        data.insert(key.to_string(), value);
        self.save(&data)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// In-memory store, used where nothing should touch the disk
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let data = self.data.lock().map_err(|_| eyre!("Memory store lock poisoned"))?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut data = self.data.lock().map_err(|_| eyre!("Memory store lock poisoned"))?;
        data.insert(key.to_string(), value);
        Ok(())
    }
}
