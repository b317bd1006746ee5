//! DataStore - flat JSON key-value file store
//!
//! Persists a single JSON object on disk and exposes it as a key-value map.
//! Every mutation rewrites the whole file; there is no append format and no
//! locking, so concurrent writers race and the last one wins.
//!
//! # Layout
//!
//! ```text
//! datastore.json
//! {
//!   "knownBots": ["n00dles", "foodnstuff"],
//!   ...
//! }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use datastore::{DataStore, KeyValueStore};
//!
//! let store = DataStore::open("datastore.json")?;
//! store.set("knownBots", serde_json::json!(["n00dles"]))?;
//! let bots = store.get("knownBots")?;
//! ```

pub mod cli;
mod store;

pub use store::{DataStore, KeyValueStore, MemoryStore};

/// Default file name for the store
pub const DEFAULT_FILE_NAME: &str = "datastore.json";
