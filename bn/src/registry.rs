//! Known-worker registry
//!
//! The set of worker ids that have answered at least once. The coordinator
//! uses it to know how many broadcast answers to expect and to name the
//! workers that stayed silent. It is advisory bookkeeping: the backing store
//! has no locking and concurrent coordinators simply overwrite each other.

use std::collections::BTreeSet;
use std::sync::Arc;

use datastore::KeyValueStore;
use eyre::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Store key holding the registry
pub const KNOWN_BOTS_KEY: &str = "knownBots";

pub struct KnownWorkerRegistry {
    store: Arc<dyn KeyValueStore>,
    workers: BTreeSet<String>,
}

impl KnownWorkerRegistry {
    /// Load the registry from the store; an absent key is an empty registry
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let workers = match store.get(KNOWN_BOTS_KEY)? {
            None => BTreeSet::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(id) => Some(id),
                    other => {
                        warn!(?other, "Ignoring non-string entry in known worker registry");
                        None
                    }
                })
                .collect(),
            Some(other) => {
                warn!(?other, "Known worker registry is not a list, starting empty");
                BTreeSet::new()
            }
        };

        debug!(count = workers.len(), "KnownWorkerRegistry::load: loaded");
        Ok(Self { store, workers })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn contains(&self, worker_id: &str) -> bool {
        self.workers.contains(worker_id)
    }

    /// Current members, sorted
    pub fn workers(&self) -> Vec<String> {
        self.workers.iter().cloned().collect()
    }

    /// Add a worker; persists only when it was not already known.
    ///
    /// Returns whether the worker is new.
    pub fn add(&mut self, worker_id: &str) -> Result<bool> {
        if self.workers.contains(worker_id) {
            return Ok(false);
        }
        self.workers.insert(worker_id.to_string());
        self.persist()?;
        info!(%worker_id, count = self.workers.len(), "Added worker to known registry");
        Ok(true)
    }

    /// Forget every known worker
    pub fn reset(&mut self) -> Result<()> {
        info!(previous = self.workers.len(), "Resetting known worker registry");
        self.workers.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let list = self.workers.iter().cloned().map(Value::String).collect();
        self.store.set(KNOWN_BOTS_KEY, Value::Array(list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datastore::{DataStore, MemoryStore};
    use proptest::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn memory_registry() -> (Arc<MemoryStore>, KnownWorkerRegistry) {
        let store = Arc::new(MemoryStore::new());
        let registry = KnownWorkerRegistry::load(store.clone()).unwrap();
        (store, registry)
    }

    #[test]
    fn test_absent_key_is_empty_and_not_created() {
        let (store, registry) = memory_registry();
        assert!(registry.is_empty());
        assert!(store.get(KNOWN_BOTS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_add_persists_new_worker() {
        let (store, mut registry) = memory_registry();

        assert!(registry.add("n00dles").unwrap());
        assert!(registry.contains("n00dles"));
        assert_eq!(store.get(KNOWN_BOTS_KEY).unwrap(), Some(json!(["n00dles"])));
    }

    #[test]
    fn test_add_twice_is_idempotent() {
        let (store, mut registry) = memory_registry();

        assert!(registry.add("home").unwrap());
        assert!(!registry.add("home").unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(store.get(KNOWN_BOTS_KEY).unwrap(), Some(json!(["home"])));
    }

    #[test]
    fn test_reset_empties_store() {
        let (store, mut registry) = memory_registry();
        registry.add("a").unwrap();
        registry.add("b").unwrap();

        registry.reset().unwrap();
        assert!(registry.is_empty());
        assert_eq!(store.get(KNOWN_BOTS_KEY).unwrap(), Some(json!([])));
    }

    #[test]
    fn test_load_skips_junk_entries() {
        let store = Arc::new(MemoryStore::new());
        store.set(KNOWN_BOTS_KEY, json!(["a", 7, "b", null])).unwrap();

        let registry = KnownWorkerRegistry::load(store).unwrap();
        assert_eq!(registry.workers(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_load_non_list_is_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(KNOWN_BOTS_KEY, json!({"oops": true})).unwrap();

        let registry = KnownWorkerRegistry::load(store).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_survives_reload_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("datastore.json");

        {
            let store = Arc::new(DataStore::open(&path).unwrap());
            let mut registry = KnownWorkerRegistry::load(store).unwrap();
            registry.add("foodnstuff").unwrap();
            registry.add("n00dles").unwrap();
        }

        let store = Arc::new(DataStore::open(&path).unwrap());
        let registry = KnownWorkerRegistry::load(store).unwrap();
        assert_eq!(registry.workers(), vec!["foodnstuff".to_string(), "n00dles".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_adding_known_worker_changes_nothing(
            ids in proptest::collection::vec("[a-z0-9]{1,8}", 1..8),
            pick in any::<prop::sample::Index>(),
        ) {
            let (store, mut registry) = memory_registry();
            for id in &ids {
                registry.add(id).unwrap();
            }
            let before = registry.workers();
            let stored_before = store.get(KNOWN_BOTS_KEY).unwrap();

            let again = pick.get(&ids);
            prop_assert!(!registry.add(again).unwrap());
            prop_assert_eq!(registry.workers(), before);
            prop_assert_eq!(store.get(KNOWN_BOTS_KEY).unwrap(), stored_before);
        }
    }
}
