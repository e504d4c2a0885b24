//! Database Registry
//!
//! Maps logical database names to engine namespace handles.
//!
//! ## Responsibilities
//! - Seed from the namespaces found when the engine opens
//! - Create and drop namespaces through the engine
//! - Gate deletion on the handler reference count
//!
//! ## Locking
//! ```text
//!   manager engine (RwLock)      shared by manager calls, exclusive for
//!   │                            initialize / finalize / close
//!   slots (RwLock<HashMap>)      held briefly: lookup / insert / remove
//!      └── DbSlot.state (RwLock) held across engine calls
//!            shared:    get_handler, bulk load, handler forwarding
//!            exclusive: create, delete, finalize
//! ```
//! A slot's state lock may be held while taking the `slots` lock, never the
//! other way around.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::engine::StorageEngine;
use crate::error::{KvdbError, Result};
use crate::handler::HandlerCollection;

/// Lifecycle of one logical database
#[derive(Debug)]
pub(crate) enum SlotState<N> {
    /// Engine call in flight; only the creator can observe this
    Creating,

    /// Namespace open in the engine
    Active(N),

    /// Dropped or released; the slot is already out of the map
    Dropped,
}

impl<N> SlotState<N> {
    pub(crate) fn active(&self) -> Option<&N> {
        match self {
            SlotState::Active(namespace) => Some(namespace),
            _ => None,
        }
    }
}

/// One registry entry
#[derive(Debug)]
pub(crate) struct DbSlot<N> {
    name: String,
    state: RwLock<SlotState<N>>,
}

impl<N> DbSlot<N> {
    fn new(name: &str, state: SlotState<N>) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(state),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Shared access to the state; blocks while a create or delete holds it
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, SlotState<N>> {
        self.state.read()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state.read().active().is_some()
    }
}

/// Registry of logical databases
pub(crate) struct Registry<E: StorageEngine> {
    slots: RwLock<HashMap<String, Arc<DbSlot<E::Namespace>>>>,
}

impl<E: StorageEngine> Registry<E> {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Register namespaces discovered when the engine was opened
    pub(crate) fn seed(&self, namespaces: Vec<(String, E::Namespace)>) {
        let mut slots = self.slots.write();
        for (name, namespace) in namespaces {
            debug!(db = %name, "registered existing database");
            let slot = Arc::new(DbSlot::new(&name, SlotState::Active(namespace)));
            slots.insert(name, slot);
        }
    }

    /// Find the slot for `name`, whatever its state
    pub(crate) fn lookup(&self, name: &str) -> Option<Arc<DbSlot<E::Namespace>>> {
        self.slots.read().get(name).cloned()
    }

    /// Find the slot for `name` if its database is live
    pub(crate) fn lookup_active(&self, name: &str) -> Result<Arc<DbSlot<E::Namespace>>> {
        self.lookup(name)
            .filter(|slot| slot.is_active())
            .ok_or_else(|| KvdbError::NotFound(name.to_string()))
    }

    pub(crate) fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|slot| slot.is_active())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let slots: Vec<_> = self.slots.read().values().cloned().collect();
        slots
            .into_iter()
            .filter(|slot| slot.is_active())
            .map(|slot| slot.name.clone())
            .collect()
    }

    /// Create `name` unless it already exists
    ///
    /// Returns `true` when a namespace was created. Concurrent callers for the
    /// same name wait for the first one and then see it as existing.
    pub(crate) fn create(&self, engine: &E, name: &str) -> Result<bool> {
        loop {
            if let Some(existing) = self.lookup(name) {
                if existing.is_active() {
                    return Ok(false);
                }
                // Dropped slots are removed before their lock is released
                continue;
            }

            let slot = Arc::new(DbSlot::new(name, SlotState::Creating));
            let mut state = slot.state.write();
            {
                let mut slots = self.slots.write();
                if slots.contains_key(name) {
                    continue;
                }
                slots.insert(name.to_string(), Arc::clone(&slot));
            }

            return match engine.create_namespace(name) {
                Ok(namespace) => {
                    *state = SlotState::Active(namespace);
                    info!(db = name, "database created");
                    Ok(true)
                }
                Err(e) => {
                    *state = SlotState::Dropped;
                    self.unlink(&slot);
                    warn!(db = name, error = %e, "database creation failed");
                    Err(e)
                }
            };
        }
    }

    /// Drop `name` if no handler references it
    ///
    /// The reference check and the engine drop run under the slot's exclusive
    /// lock, so no handler can be issued for `name` in between. On engine
    /// failure the database stays registered.
    pub(crate) fn delete(&self, engine: &E, name: &str, handlers: &HandlerCollection) -> Result<()> {
        let slot = self
            .lookup(name)
            .ok_or_else(|| KvdbError::NotFound(name.to_string()))?;

        let mut state = slot.state.write();
        let namespace = state
            .active()
            .cloned()
            .ok_or_else(|| KvdbError::NotFound(name.to_string()))?;

        let ref_count = handlers.ref_count(name);
        if ref_count > 0 {
            debug!(db = name, ref_count, "delete refused, database in use");
            return Err(KvdbError::AlreadyInUse {
                name: name.to_string(),
                ref_count,
            });
        }

        engine.drop_namespace(&namespace).map_err(|e| match e {
            KvdbError::Engine(msg) => {
                KvdbError::Engine(format!("Could not remove the DB {}: {}", name, msg))
            }
            other => other,
        })?;

        *state = SlotState::Dropped;
        self.unlink(&slot);
        info!(db = name, "database deleted");
        Ok(())
    }

    /// Empty the registry, running `retire` on every live namespace
    ///
    /// Used by finalize (drop namespaces) and close (just release them).
    pub(crate) fn drain<F>(&self, mut retire: F)
    where
        F: FnMut(&str, &E::Namespace),
    {
        let slots = std::mem::take(&mut *self.slots.write());
        for (name, slot) in slots {
            let mut state = slot.state.write();
            if let Some(namespace) = state.active() {
                retire(&name, namespace);
            }
            *state = SlotState::Dropped;
        }
    }

    /// Remove `slot` from the map if it is still the registered one
    fn unlink(&self, slot: &Arc<DbSlot<E::Namespace>>) {
        let mut slots = self.slots.write();
        let registered = slots
            .get(&slot.name)
            .is_some_and(|current| Arc::ptr_eq(current, slot));
        if registered {
            slots.remove(&slot.name);
        }
    }
}
