//! Sled-backed engine
//!
//! Each namespace is a sled `Tree` inside a single `Db`. The default tree
//! is the reserved namespace.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{KvdbError, Result};

use super::{KvPair, StorageEngine};

/// Tuning knobs forwarded to `sled::Config`
#[derive(Debug, Clone)]
pub struct SledOptions {
    /// Page cache size in bytes
    pub cache_capacity: u64,

    /// Background flush interval; `None` disables it
    pub flush_every_ms: Option<u64>,
}

impl Default for SledOptions {
    fn default() -> Self {
        Self {
            cache_capacity: 1024 * 1024 * 1024, // 1 GB
            flush_every_ms: Some(500),
        }
    }
}

/// Persistent engine built on sled
pub struct SledEngine {
    db: sled::Db,
}

impl StorageEngine for SledEngine {
    type Namespace = sled::Tree;
    type Options = SledOptions;

    const RESERVED_NAMESPACE: &'static str = "__sled__default";

    fn open(path: &Path, options: &Self::Options) -> Result<Self> {
        // Create the storage directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| KvdbError::io(parent, e))?;
        }

        let db = sled::Config::new()
            .path(path)
            .cache_capacity(options.cache_capacity)
            .flush_every_ms(options.flush_every_ms)
            .open()?;

        debug!(path = %path.display(), recovered = db.was_recovered(), "sled engine opened");

        Ok(Self { db })
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self
            .db
            .tree_names()
            .iter()
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect())
    }

    fn open_namespace(&self, name: &str) -> Result<Self::Namespace> {
        Ok(self.db.open_tree(name)?)
    }

    fn create_namespace(&self, name: &str) -> Result<Self::Namespace> {
        Ok(self.db.open_tree(name)?)
    }

    fn drop_namespace(&self, namespace: &Self::Namespace) -> Result<()> {
        if self.db.drop_tree(namespace.name())? {
            Ok(())
        } else {
            Err(KvdbError::Engine(format!(
                "namespace '{}' does not exist",
                Self::namespace_name(namespace)
            )))
        }
    }

    fn namespace_name(namespace: &Self::Namespace) -> String {
        String::from_utf8_lossy(&namespace.name()).into_owned()
    }

    fn put(&self, namespace: &Self::Namespace, key: &[u8], value: &[u8]) -> Result<()> {
        namespace.insert(key, value)?;
        Ok(())
    }

    fn get(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(namespace.get(key)?.map(|v| v.to_vec()))
    }

    fn remove(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<()> {
        namespace.remove(key)?;
        Ok(())
    }

    fn contains(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<bool> {
        Ok(namespace.contains_key(key)?)
    }

    fn scan(&self, namespace: &Self::Namespace) -> Result<Vec<KvPair>> {
        namespace
            .iter()
            .map(|item| -> Result<KvPair> {
                let (k, v) = item?;
                Ok((k.to_vec(), v.to_vec()))
            })
            .collect()
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
