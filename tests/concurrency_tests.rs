//! Concurrency tests for KvdbManager
//!
//! These tests verify:
//! - Handlers for distinct scopes acquired concurrently are all counted
//! - Concurrent creates of one name produce a single namespace
//! - Delete never succeeds under a live handler
//! - Concurrent acquire/release leaves the counts balanced

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{setup_flaky_manager, setup_memory_manager, setup_sled_manager, Faults};
use tenantkv::KvdbError;

// =============================================================================
// Acquire Tests
// =============================================================================

#[test]
fn test_concurrent_handlers_distinct_scopes() {
    let (_temp, manager) = setup_sled_manager();
    manager.create_db("alerts").unwrap();
    let manager = Arc::new(manager);

    let mut handles = vec![];
    for t in 0..8 {
        let manager_clone = Arc::clone(&manager);
        handles.push(thread::spawn(move || {
            manager_clone
                .get_handler("alerts", &format!("scope{}", t))
                .unwrap()
        }));
    }

    let held: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let info = manager.handlers_info();
    assert_eq!(info["alerts"].len(), 8);
    for t in 0..8 {
        assert_eq!(info["alerts"][&format!("scope{}", t)], 1);
    }
    assert_eq!(manager.scopes_info().len(), 8);

    drop(held);
    assert!(manager.handlers_info().is_empty());
}

#[test]
fn test_concurrent_acquire_release_balances() {
    let manager = setup_memory_manager();
    manager.create_db("alerts").unwrap();
    manager.create_db("rules").unwrap();

    crossbeam::thread::scope(|s| {
        for t in 0..4 {
            let manager = &manager;
            s.spawn(move |_| {
                let scope = format!("scope{}", t % 2);
                for i in 0..200 {
                    let db = if i % 2 == 0 { "alerts" } else { "rules" };
                    let handler = manager.get_handler(db, &scope).unwrap();
                    handler.set(&format!("t{}-{}", t, i), "x").unwrap();
                    handler.release();
                }
            });
        }
    })
    .unwrap();

    assert!(manager.handlers_info().is_empty());
    manager.delete_db("alerts").unwrap();
    manager.delete_db("rules").unwrap();
}

#[test]
fn test_concurrent_counts_match_live_handlers() {
    let manager = setup_memory_manager();
    manager.create_db("alerts").unwrap();

    let held = crossbeam::thread::scope(|s| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let manager = &manager;
                s.spawn(move |_| {
                    (0..50)
                        .map(|_| manager.get_handler("alerts", "shared").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect::<Vec<_>>()
    })
    .unwrap();

    assert_eq!(held.len(), 200);
    assert_eq!(manager.handlers_info()["alerts"]["shared"], 200);
    match manager.delete_db("alerts") {
        Err(KvdbError::AlreadyInUse { ref_count, .. }) => assert_eq!(ref_count, 200),
        other => panic!("expected AlreadyInUse, got {:?}", other),
    }
}

// =============================================================================
// Create / Delete Races
// =============================================================================

#[test]
fn test_concurrent_create_same_name() {
    let (_temp, faults, manager) = setup_flaky_manager();

    crossbeam::thread::scope(|s| {
        for _ in 0..8 {
            let manager = &manager;
            s.spawn(move |_| manager.create_db("alerts").unwrap());
        }
    })
    .unwrap();

    assert_eq!(Faults::count(&faults.creates), 1);
    assert_eq!(manager.list_dbs(), vec!["alerts".to_string()]);
}

#[test]
fn test_concurrent_create_distinct_names() {
    let (_temp, manager) = setup_sled_manager();

    crossbeam::thread::scope(|s| {
        for t in 0..8 {
            let manager = &manager;
            s.spawn(move |_| manager.create_db(&format!("db{}", t)).unwrap());
        }
    })
    .unwrap();

    assert_eq!(manager.list_dbs().len(), 8);
    for t in 0..8 {
        assert!(manager.exists_db(&format!("db{}", t)));
    }
}

#[test]
fn test_create_racing_finalize_leaves_nothing_behind() {
    for _ in 0..20 {
        let manager = setup_memory_manager();

        crossbeam::thread::scope(|s| {
            let manager = &manager;
            s.spawn(move |_| {
                for i in 0..100 {
                    match manager.create_db(&format!("db{}", i)) {
                        Ok(()) | Err(KvdbError::NotInitialized) => {}
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            });
            s.spawn(move |_| {
                thread::yield_now();
                manager.finalize().unwrap();
            });
        })
        .unwrap();

        // Nothing created against the finalized engine may survive
        assert!(!manager.is_initialized());
        assert!(manager.list_dbs().is_empty());

        manager.initialize().unwrap();
        assert!(manager.list_dbs().is_empty());
        assert!(matches!(
            manager.get_handler("db0", "late"),
            Err(KvdbError::NotFound(_))
        ));
    }
}

#[test]
fn test_delete_never_succeeds_under_live_handler() {
    let manager = setup_memory_manager();
    manager.create_db("shared").unwrap();

    let deletions = AtomicUsize::new(0);
    let acquired = AtomicUsize::new(0);

    crossbeam::thread::scope(|s| {
        for t in 0..3 {
            let manager = &manager;
            let acquired = &acquired;
            s.spawn(move |_| {
                let scope = format!("reader{}", t);
                for _ in 0..300 {
                    match manager.get_handler("shared", &scope) {
                        Ok(handler) => {
                            acquired.fetch_add(1, Ordering::SeqCst);
                            // The database cannot disappear while we hold it
                            handler.set("k", "v").unwrap();
                            assert!(handler.contains("k").unwrap());
                        }
                        Err(KvdbError::NotFound(_)) => {}
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            });
        }

        let manager = &manager;
        let deletions = &deletions;
        s.spawn(move |_| {
            for _ in 0..300 {
                match manager.delete_db("shared") {
                    Ok(()) => {
                        deletions.fetch_add(1, Ordering::SeqCst);
                        manager.create_db("shared").unwrap();
                    }
                    Err(KvdbError::AlreadyInUse { ref_count, .. }) => assert!(ref_count > 0),
                    Err(KvdbError::NotFound(_)) => manager.create_db("shared").unwrap(),
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        });
    })
    .unwrap();

    assert!(acquired.load(Ordering::SeqCst) > 0);
    assert!(manager.handlers_info().is_empty());
    assert!(manager.exists_db("shared"));
}

#[test]
fn test_delete_other_database_while_handler_held() {
    let manager = setup_memory_manager();
    manager.create_db("busy").unwrap();
    manager.create_db("idle").unwrap();

    let handler = manager.get_handler("busy", "indexer").unwrap();

    crossbeam::thread::scope(|s| {
        let manager = &manager;
        s.spawn(move |_| manager.delete_db("idle").unwrap());
    })
    .unwrap();

    assert!(!manager.exists_db("idle"));
    assert!(manager.exists_db("busy"));
    handler.set("k", "v").unwrap();
}
