//! Journey: the maintenance tick.
//!
//! One tick recomputes stale neighborhoods, sweeps the embedding cache,
//! expires the working buffer, and runs the importance decay pass, all
//! under a cross-connection advisory lock.

use std::sync::Arc;

use keepsake_e2e_tests::{TestHarness, EMBEDDING_DIMENSIONS};
use keepsake_core::locks::{NamedLocks, MAINTENANCE};
use keepsake_core::{MemoryType, Store};

#[test]
fn tick_refreshes_stale_neighborhoods() {
    let harness = TestHarness::new();
    harness.remember(MemoryType::Episodic, "reviewed the incident timeline");
    harness.remember(MemoryType::Episodic, "reviewed the incident followups");
    assert_eq!(harness.engine.stats().unwrap().stale_neighborhoods, 2);

    let report = harness.engine.run_maintenance().unwrap().expect("tick ran");
    assert_eq!(report.neighborhoods_recomputed, 2);
    assert_eq!(harness.engine.stats().unwrap().stale_neighborhoods, 0);
}

#[test]
fn fresh_neighborhoods_feed_the_association_signal() {
    let harness = TestHarness::new();
    harness.remember(MemoryType::Episodic, "tuned the retry policy");
    harness.remember(MemoryType::Episodic, "tuned the backoff policy");
    harness.engine.run_maintenance().unwrap().expect("tick ran");

    let results = harness.engine.fast_recall("tuned the retry policy", 5).unwrap();
    // With neighborhoods fresh, at least one hit carries association mass
    assert!(results.iter().any(|r| r.signals.association > 0.0));
}

#[test]
fn tick_expires_the_working_buffer() {
    let harness = TestHarness::new();
    harness
        .engine
        .add_to_working_memory(
            "promote me",
            chrono::Duration::seconds(-1),
            0.9,
            None,
        )
        .unwrap();
    harness
        .engine
        .add_to_working_memory(
            "discard me",
            chrono::Duration::seconds(-1),
            0.1,
            None,
        )
        .unwrap();

    let report = harness.engine.run_maintenance().unwrap().expect("tick ran");
    assert_eq!(report.working.promoted.len(), 1);
    assert_eq!(report.working.discarded, 1);
    assert_eq!(harness.engine.stats().unwrap().working_items, 0);
}

#[test]
fn first_decay_pass_only_records_its_start() {
    let harness = TestHarness::new();
    harness.remember(MemoryType::Episodic, "will decay eventually");
    let report = harness.engine.run_maintenance().unwrap().expect("tick ran");
    assert_eq!(report.memories_decayed, 0);

    // Back-to-back passes see no meaningful elapsed time
    let again = harness.engine.run_maintenance().unwrap().expect("tick ran");
    assert_eq!(again.memories_decayed, 0);
}

#[test]
fn tick_skips_when_another_holder_has_the_lock() {
    let harness = TestHarness::new();
    // A second connection to the same database takes the lock first
    let other = Arc::new(
        Store::open(Some(harness.db_path().clone()), EMBEDDING_DIMENSIONS).unwrap(),
    );
    let locks = NamedLocks::new(other);
    let _held = locks.try_acquire(MAINTENANCE).unwrap().expect("lock free");

    assert!(harness.engine.run_maintenance().unwrap().is_none());
    drop(_held);
    assert!(harness.engine.run_maintenance().unwrap().is_some());
}

#[test]
fn tick_sweeps_nothing_while_entries_are_young() {
    let harness = TestHarness::new();
    harness.remember(MemoryType::Episodic, "cached embedding");
    let cached_before = harness.engine.stats().unwrap().cached_embeddings;
    assert!(cached_before >= 1);

    let report = harness.engine.run_maintenance().unwrap().expect("tick ran");
    assert_eq!(report.embeddings_evicted, 0);
    assert_eq!(
        harness.engine.stats().unwrap().cached_embeddings,
        cached_before
    );
}
