//! Journey: remember, recall, touch.
//!
//! The core loop a host agent runs all day: store observations, retrieve
//! the relevant ones, then record which were actually used.

use keepsake_e2e_tests::TestHarness;
use keepsake_core::MemoryType;

#[test]
fn remember_then_recall_returns_the_memory() {
    let harness = TestHarness::new();
    let created = harness.remember(MemoryType::Episodic, "deployed the billing service");
    harness.remember(MemoryType::Episodic, "watered the office plants");

    let results = harness
        .engine
        .fast_recall("deployed the billing service", 5)
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].id, created.id);
    assert!(results[0].score > 0.0);
}

#[test]
fn recall_is_pure_until_touch() {
    let harness = TestHarness::new();
    let created = harness.remember(MemoryType::Episodic, "met the new contractor");

    harness.engine.fast_recall("contractor", 5).unwrap();
    let untouched = harness.engine.get_memory(&created.id).unwrap().unwrap();
    assert_eq!(untouched.access_count, 0);
    assert!(untouched.last_accessed.is_none());

    let changed = harness.engine.touch(&[created.id.clone()]).unwrap();
    assert_eq!(changed, 1);
    let touched = harness.engine.get_memory(&created.id).unwrap().unwrap();
    assert_eq!(touched.access_count, 1);
    assert!(touched.last_accessed.is_some());
    assert!(touched.importance > untouched.importance);
}

#[test]
fn touch_skips_missing_ids() {
    let harness = TestHarness::new();
    let created = harness.remember(MemoryType::Episodic, "real memory");
    let changed = harness
        .engine
        .touch(&[created.id.clone(), "no-such-id".to_string()])
        .unwrap();
    assert_eq!(changed, 1);
}

#[test]
fn repeated_content_never_embeds_twice() {
    let harness = TestHarness::new();
    harness.remember(MemoryType::Episodic, "the same observation");
    let calls_after_first = harness.embedder.calls();
    harness.remember(MemoryType::Episodic, "the same observation");
    assert_eq!(harness.embedder.calls(), calls_after_first);
}

#[test]
fn archived_memories_leave_recall() {
    let harness = TestHarness::new();
    let created = harness.remember(MemoryType::Episodic, "obsolete runbook step");

    let before = harness.engine.fast_recall("obsolete runbook step", 5).unwrap();
    assert!(before.iter().any(|r| r.id == created.id));

    assert!(harness.engine.archive(&created.id).unwrap());
    let after = harness.engine.fast_recall("obsolete runbook step", 5).unwrap();
    assert!(after.iter().all(|r| r.id != created.id));

    // Archival is terminal, not a soft delete that can flip again
    assert!(!harness.engine.invalidate(&created.id).unwrap());
}

#[test]
fn frozen_emotional_context_survives_mood_shifts() {
    use keepsake_core::AffectSnapshot;

    let harness = TestHarness::new();
    harness.affect.set(AffectSnapshot {
        valence: Some(0.9),
        arousal: Some(0.8),
        dominance: Some(0.5),
        primary_emotion: Some("joy".to_string()),
        intensity: Some(0.7),
    });
    let created = harness.remember(MemoryType::Episodic, "won the hackathon");

    // Mood collapses afterwards; the stored context must not move
    harness.affect.set(AffectSnapshot {
        valence: Some(-0.8),
        arousal: Some(0.2),
        dominance: Some(0.3),
        primary_emotion: Some("gloom".to_string()),
        intensity: Some(0.4),
    });
    let stored = harness.engine.get_memory(&created.id).unwrap().unwrap();
    assert_eq!(stored.emotional_context.valence, Some(0.9));
    assert_eq!(
        stored.emotional_context.primary_emotion.as_deref(),
        Some("joy")
    );
}
