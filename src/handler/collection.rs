//! Handler Collection
//!
//! Reference counts per (database, scope) pair.
//!
//! ## Responsibilities
//! - Count outstanding handlers per database and scope
//! - Report usage by database and by scope
//! - Answer the aggregate count `delete_db` gates on

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::RefInfo;

#[derive(Debug, Default)]
struct RefState {
    /// Bumped by every reset; references taken earlier are no longer counted
    epoch: u64,

    /// db -> (scope -> count)
    counts: HashMap<String, HashMap<String, usize>>,
}

/// Tracks which scopes hold handlers on which databases
///
/// ## Concurrency:
/// - `state`: one Mutex over the epoch and `db -> (scope -> count)`, held
///   only for the duration of a single map update or snapshot
/// - The by-scope view is never stored; it is the transpose of a snapshot
#[derive(Debug, Default)]
pub struct HandlerCollection {
    state: Mutex<RefState>,
}

impl HandlerCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more handler for `scope` on `db`
    ///
    /// Returns the new count for the pair.
    pub fn add_reference(&self, db_name: &str, scope_name: &str) -> usize {
        self.acquire(db_name, scope_name).1
    }

    /// Like [`HandlerCollection::add_reference`], also returning the epoch
    /// the reference belongs to
    pub(crate) fn acquire(&self, db_name: &str, scope_name: &str) -> (u64, usize) {
        let mut state = self.state.lock();
        let epoch = state.epoch;
        let count = state
            .counts
            .entry(db_name.to_string())
            .or_default()
            .entry(scope_name.to_string())
            .or_insert(0);
        *count += 1;
        (epoch, *count)
    }

    /// Count one handler less for `scope` on `db`
    ///
    /// Entries are removed when they reach zero. Returns the remaining count
    /// for the pair, or `None` if the pair was not tracked.
    pub fn release_reference(&self, db_name: &str, scope_name: &str) -> Option<usize> {
        let mut state = self.state.lock();
        Self::release_locked(&mut state, db_name, scope_name)
    }

    /// Release a reference taken by [`HandlerCollection::acquire`]
    ///
    /// References from before the last reset were already discarded and are
    /// ignored.
    pub(crate) fn release_acquired(
        &self,
        epoch: u64,
        db_name: &str,
        scope_name: &str,
    ) -> Option<usize> {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            debug!(db = db_name, scope = scope_name, "ignoring release from an earlier epoch");
            return None;
        }
        Self::release_locked(&mut state, db_name, scope_name)
    }

    /// Forget every reference
    ///
    /// Handlers issued before the reset no longer count and their release is
    /// a no-op. Returns how many references were discarded.
    pub fn reset(&self) -> usize {
        let mut state = self.state.lock();
        let discarded = state
            .counts
            .values()
            .flat_map(|scopes| scopes.values())
            .sum();
        state.counts.clear();
        state.epoch += 1;
        discarded
    }

    fn release_locked(state: &mut RefState, db_name: &str, scope_name: &str) -> Option<usize> {
        let refs = &mut state.counts;

        let Some(scopes) = refs.get_mut(db_name) else {
            warn!(db = db_name, scope = scope_name, "release of untracked database reference");
            return None;
        };
        let Some(count) = scopes.get_mut(scope_name) else {
            warn!(db = db_name, scope = scope_name, "release of untracked scope reference");
            return None;
        };

        *count -= 1;
        let remaining = *count;

        if remaining == 0 {
            scopes.remove(scope_name);
            if scopes.is_empty() {
                refs.remove(db_name);
            }
        }

        Some(remaining)
    }

    /// Total handlers on `db` across all scopes
    pub fn ref_count(&self, db_name: &str) -> usize {
        self.state
            .lock()
            .counts
            .get(db_name)
            .map(|scopes| scopes.values().sum())
            .unwrap_or(0)
    }

    /// Names of every database with at least one handler
    pub fn db_names(&self) -> Vec<String> {
        self.state.lock().counts.keys().cloned().collect()
    }

    /// True when no handler is outstanding
    pub fn is_empty(&self) -> bool {
        self.state.lock().counts.is_empty()
    }

    /// Snapshot: database -> (scope -> count)
    pub fn handlers_info(&self) -> BTreeMap<String, RefInfo> {
        self.state
            .lock()
            .counts
            .iter()
            .map(|(db_name, scopes)| {
                let info = scopes
                    .iter()
                    .map(|(scope, count)| (scope.clone(), *count))
                    .collect();
                (db_name.clone(), info)
            })
            .collect()
    }

    /// Snapshot: scope -> (database -> count)
    pub fn scopes_info(&self) -> BTreeMap<String, RefInfo> {
        transpose(&self.handlers_info())
    }
}

/// Re-index a reference map by its inner key
///
/// `db -> (scope -> n)` becomes `scope -> (db -> n)` and back.
pub fn transpose(info: &BTreeMap<String, RefInfo>) -> BTreeMap<String, RefInfo> {
    let mut transposed: BTreeMap<String, RefInfo> = BTreeMap::new();
    for (outer, inner) in info {
        for (key, count) in inner {
            transposed
                .entry(key.clone())
                .or_default()
                .insert(outer.clone(), *count);
        }
    }
    transposed
}
