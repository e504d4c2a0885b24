//! Shared helpers for integration tests
//!
//! `FlakyEngine` wraps the in-memory engine and fails on demand, so tests can
//! drive the engine-failure paths of the manager.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;
use tenantkv::engine::{KvPair, MemoryEngine, MemoryNamespace};
use tenantkv::{Config, KvdbError, KvdbManager, Result, StorageEngine};

// =============================================================================
// Fault Injection
// =============================================================================

/// Switches and counters shared between a test and its engine
#[derive(Debug, Default)]
pub struct Faults {
    pub fail_list: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_drop: AtomicBool,

    /// 1-based index of the put that fails; 0 disables
    pub fail_put_at: AtomicUsize,

    pub creates: AtomicUsize,
    pub drops: AtomicUsize,
    pub puts: AtomicUsize,

    /// Every successful put, in order
    pub written: Mutex<Vec<(String, String)>>,
}

impl Faults {
    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory engine with injectable failures
pub struct FlakyEngine {
    inner: MemoryEngine,
    faults: Arc<Faults>,
}

impl StorageEngine for FlakyEngine {
    type Namespace = MemoryNamespace;
    type Options = Arc<Faults>;

    const RESERVED_NAMESPACE: &'static str = MemoryEngine::RESERVED_NAMESPACE;

    fn open(path: &Path, options: &Self::Options) -> Result<Self> {
        Ok(Self {
            inner: MemoryEngine::open(path, &())?,
            faults: Arc::clone(options),
        })
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        if self.faults.fail_list.load(Ordering::SeqCst) {
            return Err(KvdbError::Engine("injected list failure".to_string()));
        }
        self.inner.list_namespaces()
    }

    fn open_namespace(&self, name: &str) -> Result<Self::Namespace> {
        self.inner.open_namespace(name)
    }

    fn create_namespace(&self, name: &str) -> Result<Self::Namespace> {
        if self.faults.fail_create.load(Ordering::SeqCst) {
            return Err(KvdbError::Engine("injected create failure".to_string()));
        }
        self.faults.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_namespace(name)
    }

    fn drop_namespace(&self, namespace: &Self::Namespace) -> Result<()> {
        if self.faults.fail_drop.load(Ordering::SeqCst) {
            return Err(KvdbError::Engine("injected drop failure".to_string()));
        }
        self.faults.drops.fetch_add(1, Ordering::SeqCst);
        self.inner.drop_namespace(namespace)
    }

    fn namespace_name(namespace: &Self::Namespace) -> String {
        MemoryEngine::namespace_name(namespace)
    }

    fn put(&self, namespace: &Self::Namespace, key: &[u8], value: &[u8]) -> Result<()> {
        let n = self.faults.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.faults.fail_put_at.load(Ordering::SeqCst) {
            return Err(KvdbError::Engine("injected put failure".to_string()));
        }
        self.inner.put(namespace, key, value)?;
        self.faults.written.lock().push((
            String::from_utf8_lossy(key).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        ));
        Ok(())
    }

    fn get(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(namespace, key)
    }

    fn remove(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<()> {
        self.inner.remove(namespace, key)
    }

    fn contains(&self, namespace: &Self::Namespace, key: &[u8]) -> Result<bool> {
        self.inner.contains(namespace, key)
    }

    fn scan(&self, namespace: &Self::Namespace) -> Result<Vec<KvPair>> {
        self.inner.scan(namespace)
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }
}

// =============================================================================
// Setup Helpers
// =============================================================================

pub fn temp_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .storage_path(temp_dir.path())
        .db_name("kvdb")
        .build()
}

/// Initialized sled-backed manager in a fresh directory
pub fn setup_sled_manager() -> (TempDir, KvdbManager) {
    let temp_dir = TempDir::new().unwrap();
    let manager = KvdbManager::new(temp_config(&temp_dir));
    manager.initialize().unwrap();
    (temp_dir, manager)
}

/// Initialized in-memory manager
pub fn setup_memory_manager() -> KvdbManager<MemoryEngine> {
    let manager = KvdbManager::in_memory();
    manager.initialize().unwrap();
    manager
}

/// Initialized manager over a `FlakyEngine`, plus its fault switches
pub fn setup_flaky_manager() -> (TempDir, Arc<Faults>, KvdbManager<FlakyEngine>) {
    let temp_dir = TempDir::new().unwrap();
    let faults = Arc::new(Faults::default());
    let manager = KvdbManager::with_options(temp_config(&temp_dir), Arc::clone(&faults));
    manager.initialize().unwrap();
    (temp_dir, faults, manager)
}

/// Write `contents` to `name` inside `dir` and return its path
pub fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
