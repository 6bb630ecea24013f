//! Journey: working memory, promote or discard.
//!
//! Short-lived observations sit in a TTL buffer; the valuable ones
//! graduate into long-term episodic memories with provenance pointing
//! back at the buffer.

use chrono::Duration;
use keepsake_e2e_tests::TestHarness;
use keepsake_core::MemoryType;

#[test]
fn expired_valuable_item_becomes_long_term_memory() {
    let harness = TestHarness::new();
    let item = harness
        .engine
        .add_to_working_memory(
            "the deploy window moved to thursday",
            Duration::seconds(-1),
            0.9,
            Some(0.6),
        )
        .unwrap();

    let report = harness.engine.cleanup_working_memory().unwrap();
    assert_eq!(report.promoted.len(), 1);
    assert_eq!(report.discarded, 0);

    let (item_id, memory_id) = &report.promoted[0];
    assert_eq!(item_id, &item.id);
    let promoted = harness.engine.get_memory(memory_id).unwrap().unwrap();
    assert_eq!(promoted.memory_type, MemoryType::Episodic);
    assert_eq!(promoted.content, "the deploy window moved to thursday");
    assert_eq!(promoted.embedding, item.embedding);

    let source = promoted.source_attribution.expect("provenance");
    assert_eq!(source.kind, "working_memory");
    assert_eq!(source.reference.as_deref(), Some(item.id.as_str()));

    // The buffer row is gone either way
    assert!(harness.engine.get_working_item(&item.id).unwrap().is_none());
}

#[test]
fn promoted_memory_is_recallable() {
    let harness = TestHarness::new();
    harness
        .engine
        .add_to_working_memory(
            "switched the linter to the new ruleset",
            Duration::seconds(-1),
            0.9,
            None,
        )
        .unwrap();
    harness.engine.cleanup_working_memory().unwrap();

    let results = harness
        .engine
        .fast_recall("switched the linter to the new ruleset", 5)
        .unwrap();
    assert!(results
        .iter()
        .any(|r| r.content == "switched the linter to the new ruleset"));
}

#[test]
fn promotion_reuses_the_buffered_embedding() {
    let harness = TestHarness::new();
    harness
        .engine
        .add_to_working_memory("observed once", Duration::seconds(-1), 0.9, None)
        .unwrap();
    let calls_before = harness.embedder.calls();
    harness.engine.cleanup_working_memory().unwrap();
    assert_eq!(harness.embedder.calls(), calls_before);
}

#[test]
fn low_value_item_is_discarded() {
    let harness = TestHarness::new();
    harness
        .engine
        .add_to_working_memory("passing noise", Duration::seconds(-1), 0.1, None)
        .unwrap();

    let report = harness.engine.cleanup_working_memory().unwrap();
    assert!(report.promoted.is_empty());
    assert_eq!(report.discarded, 1);
    assert!(harness.engine.stats().unwrap().active_memories == 0);
}

#[test]
fn promote_flag_overrides_thresholds() {
    let harness = TestHarness::new();
    let item = harness
        .engine
        .add_to_working_memory("seems minor now", Duration::seconds(-1), 0.1, None)
        .unwrap();
    harness.engine.flag_for_promotion(&item.id, true).unwrap();

    let report = harness.engine.cleanup_working_memory().unwrap();
    assert_eq!(report.promoted.len(), 1);
}

#[test]
fn unexpired_items_stay_buffered() {
    let harness = TestHarness::new();
    let item = harness
        .engine
        .add_to_working_memory("still fresh", Duration::hours(1), 0.9, None)
        .unwrap();

    let report = harness.engine.cleanup_working_memory().unwrap();
    assert!(report.promoted.is_empty());
    assert_eq!(report.discarded, 0);
    assert!(harness.engine.get_working_item(&item.id).unwrap().is_some());
}

#[test]
fn reads_bump_access_counts_toward_promotion() {
    let harness = TestHarness::new();
    let item = harness
        .engine
        .add_to_working_memory("looked at repeatedly", Duration::hours(1), 0.1, None)
        .unwrap();
    for _ in 0..3 {
        harness.engine.get_working_item(&item.id).unwrap().unwrap();
    }
    let read_back = harness.engine.get_working_item(&item.id).unwrap().unwrap();
    assert!(read_back.access_count >= 3);
}
