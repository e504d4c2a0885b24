//! Manager Module
//!
//! The composition root: one engine connection, the database registry and
//! the handler collection behind a single public surface.
//!
//! ## Responsibilities
//! - Open the engine and discover existing databases on initialize
//! - Create, delete, list and look up logical databases
//! - Issue scoped handlers and report who holds them
//! - Bulk-load JSON documents into a database

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::{MemoryEngine, SledEngine, SledOptions, StorageEngine};
use crate::error::{KvdbError, Result};
use crate::handler::{transpose, HandlerCollection, KvdbHandler, RefInfo};
use crate::registry::Registry;

/// Point-in-time view of databases and their handlers
///
/// `scopes` is the transpose of `handlers`, both from the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub databases: Vec<String>,
    pub handlers: BTreeMap<String, RefInfo>,
    pub scopes: BTreeMap<String, RefInfo>,
}

/// Multiplexes logical databases over one storage engine
///
/// ## Concurrency Model
///
/// Share it behind an `Arc`; every method takes `&self`.
///
/// - `engine`: RwLock<Option<..>>, written only by initialize/finalize/close;
///   every registry operation holds it shared from start to end, so none of
///   them straddles a finalize or close
/// - `registry`: one lock per database, so operations on different names
///   never wait on each other
/// - `handlers`: Mutex-protected counts, shared with every issued handler
///   and reset when the engine goes away
///
/// `delete_db` checks the reference count and drops the namespace while
/// holding the database's exclusive lock; `get_handler` counts its reference
/// under the shared one. The two never interleave on the same name.
pub struct KvdbManager<E: StorageEngine = SledEngine> {
    /// Manager configuration
    config: Config,

    /// Engine tuning, used on every initialize
    options: E::Options,

    /// Open engine connection; `None` before initialize and after finalize
    engine: RwLock<Option<Arc<E>>>,

    /// Logical databases and their namespaces
    registry: Registry<E>,

    /// Outstanding handlers per (database, scope)
    handlers: Arc<HandlerCollection>,
}

impl KvdbManager<SledEngine> {
    /// Create a sled-backed manager; call [`KvdbManager::initialize`] next
    pub fn new(config: Config) -> Self {
        Self::with_options(config, SledOptions::default())
    }
}

impl KvdbManager<MemoryEngine> {
    /// Create a manager whose databases live only in memory
    pub fn in_memory() -> Self {
        Self::with_options(Config::default(), ())
    }
}

impl<E: StorageEngine> KvdbManager<E> {
    /// Create a manager for engine `E` with explicit engine options
    pub fn with_options(config: Config, options: E::Options) -> Self {
        Self {
            config,
            options,
            engine: RwLock::new(None),
            registry: Registry::new(),
            handlers: Arc::new(HandlerCollection::new()),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the engine and register the databases it already holds
    ///
    /// On startup:
    /// 1. Open the engine at `{storage_path}/{db_name}`
    /// 2. Register every namespace except the reserved one
    ///
    /// Calling it again while initialized does nothing.
    pub fn initialize(&self) -> Result<()> {
        let mut current = self.engine.write();
        if current.is_some() {
            debug!("manager already initialized");
            return Ok(());
        }

        let db_path = self.config.db_path();
        let engine = E::open(&db_path, &self.options)?;

        // An engine that cannot list its namespaces is treated as empty
        let names = engine.list_namespaces().unwrap_or_else(|e| {
            warn!(path = %db_path.display(), error = %e, "could not list namespaces, starting empty");
            Vec::new()
        });

        let mut discovered = Vec::with_capacity(names.len());
        for name in names {
            if name == E::RESERVED_NAMESPACE {
                continue;
            }
            let namespace = engine.open_namespace(&name)?;
            discovered.push((name, namespace));
        }

        info!(
            path = %db_path.display(),
            databases = discovered.len(),
            "manager initialized"
        );

        self.registry.seed(discovered);
        *current = Some(Arc::new(engine));
        Ok(())
    }

    /// Drop every database and close the engine
    ///
    /// Handlers still alive afterwards fail their calls with `NotFound` and
    /// no longer count as references. Safe to call when not initialized.
    pub fn finalize(&self) -> Result<()> {
        let mut current = self.engine.write();
        let Some(engine) = current.take() else {
            return Ok(());
        };

        self.registry.drain(|name, namespace| {
            if let Err(e) = engine.drop_namespace(namespace) {
                warn!(db = name, error = %e, "failed to drop database during finalize");
            }
        });
        self.discard_references();

        engine.flush()?;
        info!("manager finalized");
        Ok(())
    }

    /// Close the engine, keeping every database on disk
    ///
    /// The next [`KvdbManager::initialize`] finds them again. Safe to call
    /// when not initialized.
    pub fn close(&self) -> Result<()> {
        let mut current = self.engine.write();
        let Some(engine) = current.take() else {
            return Ok(());
        };

        self.registry.drain(|_, _| {});
        self.discard_references();

        engine.flush()?;
        info!("manager closed");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.read().is_some()
    }

    // =========================================================================
    // Databases
    // =========================================================================

    /// Create a logical database; existing ones are left as they are
    pub fn create_db(&self, name: &str) -> Result<()> {
        self.validate_name(name)?;
        let current = self.engine.read();
        let engine = current.as_ref().ok_or(KvdbError::NotInitialized)?;
        self.registry.create(engine, name)?;
        Ok(())
    }

    /// Delete a logical database and all of its data
    ///
    /// Fails with `AlreadyInUse` while any scope holds a handler on it.
    pub fn delete_db(&self, name: &str) -> Result<()> {
        self.validate_name(name)?;
        let current = self.engine.read();
        let engine = current.as_ref().ok_or(KvdbError::NotInitialized)?;
        self.registry.delete(engine, name, &self.handlers)
    }

    pub fn exists_db(&self, name: &str) -> bool {
        self.registry.exists(name)
    }

    /// Names of all logical databases, in no particular order
    pub fn list_dbs(&self) -> Vec<String> {
        self.registry.names()
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Take a reference on `db_name` for `scope_name`
    ///
    /// The reference lasts until the handler is released or dropped.
    pub fn get_handler(&self, db_name: &str, scope_name: &str) -> Result<KvdbHandler<E>> {
        let current = self.engine.read();
        let slot = self
            .registry
            .lookup(db_name)
            .ok_or_else(|| KvdbError::NotFound(db_name.to_string()))?;
        let engine = current.as_ref().ok_or(KvdbError::NotInitialized)?;

        let epoch = {
            let state = slot.read();
            if state.active().is_none() {
                return Err(KvdbError::NotFound(db_name.to_string()));
            }
            let (epoch, count) = self.handlers.acquire(db_name, scope_name);
            debug!(db = db_name, scope = scope_name, count, "handler issued");
            epoch
        };

        Ok(KvdbHandler::new(
            Arc::downgrade(engine),
            slot,
            Arc::clone(&self.handlers),
            epoch,
            scope_name,
        ))
    }

    /// Database -> (scope -> handler count)
    pub fn handlers_info(&self) -> BTreeMap<String, RefInfo> {
        self.handlers.handlers_info()
    }

    /// Scope -> (database -> handler count)
    pub fn scopes_info(&self) -> BTreeMap<String, RefInfo> {
        self.handlers.scopes_info()
    }

    /// Databases plus both usage views, for diagnostics
    pub fn usage_report(&self) -> UsageReport {
        let mut databases = self.list_dbs();
        databases.sort();
        let handlers = self.handlers.handlers_info();
        let scopes = transpose(&handlers);
        UsageReport {
            databases,
            handlers,
            scopes,
        }
    }

    // =========================================================================
    // Bulk Load
    // =========================================================================

    /// Write every member of the JSON object in `path` into `db_name`
    ///
    /// Values are stored as their JSON text, in document order. Returns the
    /// number of entries written.
    ///
    /// Not transactional: if a write fails the remaining entries are skipped
    /// and the ones already written stay.
    pub fn load_db_from_file(&self, db_name: &str, path: impl AsRef<Path>) -> Result<usize> {
        let slot = self.registry.lookup_active(db_name)?;

        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(KvdbError::InvalidArgument("The path is empty".to_string()));
        }

        let contents = fs::read(path).map_err(|e| KvdbError::io(path, e))?;

        let document: Value = serde_json::from_slice(&contents).map_err(|e| {
            KvdbError::Format(format!(
                "An error occurred while parsing the JSON file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let Value::Object(entries) = document else {
            return Err(KvdbError::Format(format!(
                "An error occurred while parsing the JSON file '{}': JSON is not an object",
                path.display()
            )));
        };

        let current = self.engine.read();
        let engine = current.as_ref().ok_or(KvdbError::NotInitialized)?;
        let state = slot.read();
        let namespace = state
            .active()
            .ok_or_else(|| KvdbError::NotFound(db_name.to_string()))?;

        let mut written = 0;
        for (key, value) in &entries {
            let text = value.to_string();
            engine
                .put(namespace, key.as_bytes(), text.as_bytes())
                .map_err(|e| match e {
                    KvdbError::Engine(msg) => KvdbError::Engine(format!(
                        "An error occurred while inserting key '{}': {}",
                        key, msg
                    )),
                    other => other,
                })?;
            written += 1;
        }

        info!(db = db_name, path = %path.display(), entries = written, "bulk load complete");
        Ok(written)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Drop every outstanding reference; run with the engine lock held
    fn discard_references(&self) {
        let discarded = self.handlers.reset();
        if discarded > 0 {
            warn!(references = discarded, "discarding references of live handlers");
        }
    }

    fn validate_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(KvdbError::InvalidArgument(
                "The DB name is empty".to_string(),
            ));
        }
        if name == E::RESERVED_NAMESPACE {
            return Err(KvdbError::InvalidArgument(format!(
                "The DB name '{}' is reserved",
                name
            )));
        }
        Ok(())
    }
}

impl<E: StorageEngine> Drop for KvdbManager<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close manager");
        }
    }
}
