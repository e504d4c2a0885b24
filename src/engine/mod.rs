//! Engine Module
//!
//! The storage engine collaborator the manager multiplexes over.
//!
//! ## Responsibilities
//! - Open one engine connection per manager
//! - Create, attach and drop named namespaces (one per logical database)
//! - Raw key/value access inside a namespace
//!
//! The manager never looks inside a namespace handle; it only stores it,
//! hands it to handlers and passes it back to the engine.
//!
//! ## Implementations
//! - [`SledEngine`]: persistent, one sled tree per namespace (default)
//! - [`MemoryEngine`]: ephemeral, one `BTreeMap` per namespace

mod memory;
mod sled_engine;

use std::path::Path;

use crate::error::Result;

pub use memory::{MemoryEngine, MemoryNamespace};
pub use sled_engine::{SledEngine, SledOptions};

/// A key/value pair as stored in a namespace
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Opaque ordered key/value engine with named namespaces
///
/// ## Concurrency:
/// - All methods take `&self`; implementations synchronize internally
/// - Operations on different namespaces must not block each other
pub trait StorageEngine: Sized + Send + Sync + 'static {
    /// Handle identifying one namespace
    type Namespace: Clone + Send + Sync + 'static;

    /// Engine-specific tuning passed to [`StorageEngine::open`]
    type Options: Clone + Default + Send + Sync + 'static;

    /// Namespace the engine always keeps; never exposed as a logical database
    const RESERVED_NAMESPACE: &'static str;

    /// Open or create the engine at `path`
    fn open(path: &Path, options: &Self::Options) -> Result<Self>;

    /// Names of every namespace present, the reserved one included
    fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Attach to a namespace discovered by [`StorageEngine::list_namespaces`]
    fn open_namespace(&self, name: &str) -> Result<Self::Namespace>;

    /// Create a new namespace
    fn create_namespace(&self, name: &str) -> Result<Self::Namespace>;

    /// Drop a namespace and everything stored in it
    fn drop_namespace(&self, namespace: &Self::Namespace) -> Result<()>;

    /// Name the handle was opened or created with
    fn namespace_name(namespace: &Self::Namespace) -> String;

    fn put(&self, namespace: &Self::Namespace, key: &[u8], value: &[u8]) -> Result<()>;

    fn get(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn remove(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<()>;

    fn contains(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<bool>;

    /// Every pair in the namespace, in key order
    fn scan(&self, namespace: &Self::Namespace) -> Result<Vec<KvPair>>;

    /// Make all writes so far durable
    fn flush(&self) -> Result<()>;
}
