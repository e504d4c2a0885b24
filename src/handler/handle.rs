//! Database handler
//!
//! One scope's live reference to one logical database.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::engine::{KvPair, SledEngine, StorageEngine};
use crate::error::{KvdbError, Result};
use crate::registry::DbSlot;

use super::HandlerCollection;

/// Handle on a logical database, held by one scope
///
/// Obtained from `KvdbManager::get_handler`. While it is alive the database
/// cannot be deleted. Key/value calls are forwarded to the engine as-is.
pub struct KvdbHandler<E: StorageEngine = SledEngine> {
    /// Engine connection; dead once the manager is finalized or closed
    engine: Weak<E>,

    /// Registry entry of the database
    slot: Arc<DbSlot<E::Namespace>>,

    /// Where the reference is counted
    collection: Arc<HandlerCollection>,

    /// Collection epoch the reference was counted in
    epoch: u64,

    db_name: String,
    scope_name: String,

    /// Set once the reference has been returned
    released: bool,
}

impl<E: StorageEngine> KvdbHandler<E> {
    /// Wrap a reference that the caller already counted in `collection`
    /// during `epoch`
    pub(crate) fn new(
        engine: Weak<E>,
        slot: Arc<DbSlot<E::Namespace>>,
        collection: Arc<HandlerCollection>,
        epoch: u64,
        scope_name: &str,
    ) -> Self {
        Self {
            engine,
            db_name: slot.name().to_string(),
            slot,
            collection,
            epoch,
            scope_name: scope_name.to_string(),
            released: false,
        }
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    /// Store `value` under `key`
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_namespace(|engine, ns| engine.put(ns, key.as_bytes(), value.as_bytes()))
    }

    /// Store the JSON text of `value` under `key`
    pub fn set_json(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.set(key, &value.to_string())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let raw = self.with_namespace(|engine, ns| engine.get(ns, key.as_bytes()))?;
        raw.map(|bytes| into_text(key, bytes)).transpose()
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.with_namespace(|engine, ns| engine.remove(ns, key.as_bytes()))
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.with_namespace(|engine, ns| engine.contains(ns, key.as_bytes()))
    }

    /// Every key/value pair, in key order
    pub fn dump(&self) -> Result<BTreeMap<String, String>> {
        let pairs: Vec<KvPair> = self.with_namespace(|engine, ns| engine.scan(ns))?;
        pairs
            .into_iter()
            .map(|(k, v)| -> Result<(String, String)> {
                let key = String::from_utf8_lossy(&k).into_owned();
                let value = into_text(&key, v)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Return the reference now instead of at drop
    pub fn release(mut self) {
        self.release_reference();
    }

    /// Run `op` against the namespace while the database is guaranteed live
    fn with_namespace<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&E, &E::Namespace) -> Result<T>,
    {
        let state = self.slot.read();
        let namespace = state
            .active()
            .ok_or_else(|| KvdbError::NotFound(self.db_name.clone()))?;
        let engine = self.engine.upgrade().ok_or(KvdbError::NotInitialized)?;
        op(engine.as_ref(), namespace)
    }

    fn release_reference(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let remaining = self
            .collection
            .release_acquired(self.epoch, &self.db_name, &self.scope_name);
        debug!(
            db = %self.db_name,
            scope = %self.scope_name,
            remaining = remaining.unwrap_or(0),
            "handler released"
        );
    }
}

impl<E: StorageEngine> Drop for KvdbHandler<E> {
    fn drop(&mut self) {
        self.release_reference();
    }
}

impl<E: StorageEngine> fmt::Debug for KvdbHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvdbHandler")
            .field("db_name", &self.db_name)
            .field("scope_name", &self.scope_name)
            .field("released", &self.released)
            .finish()
    }
}

fn into_text(key: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| KvdbError::Format(format!("value of key '{}' is not UTF-8: {}", key, e)))
}
