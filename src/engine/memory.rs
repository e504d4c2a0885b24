//! In-memory engine
//!
//! BTreeMap-based namespaces with RwLock for concurrency. Nothing survives
//! the process; `open` ignores the path.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{KvdbError, Result};

use super::{KvPair, StorageEngine};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// Handle to one in-memory namespace
#[derive(Debug, Clone)]
pub struct MemoryNamespace {
    name: Arc<str>,
    data: Arc<RwLock<Table>>,
}

impl MemoryNamespace {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

/// Ephemeral engine, handy for tests and throwaway tenants
pub struct MemoryEngine {
    namespaces: RwLock<BTreeMap<String, MemoryNamespace>>,
}

impl StorageEngine for MemoryEngine {
    type Namespace = MemoryNamespace;
    type Options = ();

    const RESERVED_NAMESPACE: &'static str = "default";

    fn open(_path: &Path, _options: &Self::Options) -> Result<Self> {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(
            Self::RESERVED_NAMESPACE.to_string(),
            MemoryNamespace::new(Self::RESERVED_NAMESPACE),
        );
        Ok(Self {
            namespaces: RwLock::new(namespaces),
        })
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.read().keys().cloned().collect())
    }

    fn open_namespace(&self, name: &str) -> Result<Self::Namespace> {
        self.namespaces
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| KvdbError::Engine(format!("namespace '{}' does not exist", name)))
    }

    fn create_namespace(&self, name: &str) -> Result<Self::Namespace> {
        let mut namespaces = self.namespaces.write();
        let namespace = namespaces
            .entry(name.to_string())
            .or_insert_with(|| MemoryNamespace::new(name));
        Ok(namespace.clone())
    }

    fn drop_namespace(&self, namespace: &Self::Namespace) -> Result<()> {
        if &*namespace.name == Self::RESERVED_NAMESPACE {
            return Err(KvdbError::Engine(
                "the reserved namespace cannot be dropped".to_string(),
            ));
        }

        let mut namespaces = self.namespaces.write();
        let registered = namespaces
            .get(&*namespace.name)
            .is_some_and(|current| Arc::ptr_eq(&current.data, &namespace.data));
        if !registered {
            return Err(KvdbError::Engine(format!(
                "namespace '{}' does not exist",
                namespace.name
            )));
        }

        namespaces.remove(&*namespace.name);
        Ok(())
    }

    fn namespace_name(namespace: &Self::Namespace) -> String {
        namespace.name.to_string()
    }

    fn put(&self, namespace: &Self::Namespace, key: &[u8], value: &[u8]) -> Result<()> {
        namespace.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(namespace.data.read().get(key).cloned())
    }

    fn remove(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<()> {
        namespace.data.write().remove(key);
        Ok(())
    }

    fn contains(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<bool> {
        Ok(namespace.data.read().contains_key(key))
    }

    fn scan(&self, namespace: &Self::Namespace) -> Result<Vec<KvPair>> {
        Ok(namespace
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
