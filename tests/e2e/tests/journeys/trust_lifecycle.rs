//! Journey: trust over the life of a claim.
//!
//! A semantic memory earns trust from independent evidence, holds it
//! steady under resync, and loses it when contradicted.

use keepsake_e2e_tests::TestHarness;
use keepsake_core::{CreateMemoryInput, MemoryType, SourceReference, TypedMetadata};

fn claim_input(content: &str, confidence: f64, sources: Vec<SourceReference>) -> CreateMemoryInput {
    let mut input = CreateMemoryInput::new(MemoryType::Semantic, content);
    input.metadata = Some(TypedMetadata::Semantic {
        confidence,
        sources,
    });
    input
}

fn expected_cap(unique_sources: f64, avg_trust: f64) -> f64 {
    0.15 + 0.85 * (1.0 - (-0.8 * unique_sources * avg_trust).exp())
}

#[test]
fn evidence_raises_trust_with_diminishing_returns() {
    let harness = TestHarness::new();
    let one_source = harness
        .engine
        .create_memory(claim_input(
            "the API rate limit is 600 per minute",
            0.95,
            vec![SourceReference::new("url", "https://docs.example.com/limits", 0.9)],
        ))
        .unwrap();
    let cap_one = expected_cap(1.0, 0.9);
    assert!((one_source.trust_level - cap_one).abs() < 1e-6);

    let three_sources = harness
        .engine
        .create_memory(claim_input(
            "the staging cluster runs in eu-west-1",
            0.95,
            vec![
                SourceReference::new("url", "https://wiki.example.com/infra", 0.9),
                SourceReference::new("conversation", "standup-2026-08-12", 0.9),
                SourceReference::new("tool", "terraform-state", 0.9),
            ],
        ))
        .unwrap();
    let cap_three = expected_cap(3.0, 0.9);
    assert!((three_sources.trust_level - cap_three).abs() < 1e-6);

    // More evidence helps, but each source helps less than the last
    assert!(three_sources.trust_level > one_source.trust_level);
    assert!(cap_three - cap_one < 2.0 * (cap_one - 0.15));
}

#[test]
fn duplicate_sources_count_once() {
    let harness = TestHarness::new();
    let duplicated = harness
        .engine
        .create_memory(claim_input(
            "build artifacts expire after 30 days",
            0.9,
            vec![
                SourceReference::new("url", "https://ci.example.com/retention", 0.8),
                SourceReference::new("url", "https://ci.example.com/retention", 0.8),
                SourceReference::new("url", "https://ci.example.com/retention", 0.8),
            ],
        ))
        .unwrap();
    let single = harness
        .engine
        .create_memory(claim_input(
            "deploys are frozen on fridays",
            0.9,
            vec![SourceReference::new("url", "https://wiki.example.com/freeze", 0.8)],
        ))
        .unwrap();
    assert!((duplicated.trust_level - single.trust_level).abs() < 1e-9);
}

#[test]
fn confidence_caps_trust_below_the_evidence_cap() {
    let harness = TestHarness::new();
    let hesitant = harness
        .engine
        .create_memory(claim_input(
            "the retry budget might be five",
            0.2,
            vec![
                SourceReference::new("url", "https://a.example.com", 0.9),
                SourceReference::new("url", "https://b.example.com", 0.9),
                SourceReference::new("url", "https://c.example.com", 0.9),
            ],
        ))
        .unwrap();
    // Plenty of evidence, but the claim itself is hedged
    assert!((hesitant.trust_level - 0.2).abs() < 1e-9);
}

#[test]
fn resync_is_idempotent() {
    let harness = TestHarness::new();
    let claim = harness
        .engine
        .create_memory(claim_input(
            "the ingest queue is kafka",
            0.9,
            vec![SourceReference::new("url", "https://wiki.example.com/ingest", 0.85)],
        ))
        .unwrap();

    let first = harness.engine.sync_memory_trust(&claim.id).unwrap().unwrap();
    let second = harness.engine.sync_memory_trust(&claim.id).unwrap().unwrap();
    assert!((first - second).abs() < 1e-12);
    assert!((first - claim.trust_level).abs() < 1e-9);
}

#[test]
fn full_contradiction_zeroes_trust() {
    let harness = TestHarness::new();
    let claim = harness
        .engine
        .create_memory(claim_input(
            "the cache holds 10k entries",
            0.9,
            vec![SourceReference::new("url", "https://wiki.example.com/cache", 0.9)],
        ))
        .unwrap();
    assert!(claim.trust_level > 0.5);

    let belief = harness.remember(
        MemoryType::Worldview,
        "measurements beat documentation",
    );
    harness
        .engine
        .link_contradict(&claim.id, &belief.id, 1.0)
        .unwrap();

    let after = harness.engine.get_memory(&claim.id).unwrap().unwrap();
    assert!(after.trust_level.abs() < 1e-9);
}

#[test]
fn support_grants_a_bounded_bonus() {
    let harness = TestHarness::new();
    let claim = harness
        .engine
        .create_memory(claim_input(
            "backups run nightly at 0300",
            0.9,
            vec![SourceReference::new("url", "https://wiki.example.com/backups", 0.9)],
        ))
        .unwrap();
    let belief = harness.remember(MemoryType::Worldview, "scheduled jobs are dependable here");
    harness
        .engine
        .link_support(&claim.id, &belief.id, 1.0)
        .unwrap();

    let after = harness.engine.get_memory(&claim.id).unwrap().unwrap();
    assert!((after.trust_level - (claim.trust_level + 0.10)).abs() < 1e-9);
    assert!(after.trust_level <= 1.0);
}

#[test]
fn sync_is_a_noop_for_non_semantic_and_missing() {
    let harness = TestHarness::new();
    let episodic = harness.remember(MemoryType::Episodic, "just a moment in time");
    assert!(harness.engine.sync_memory_trust(&episodic.id).unwrap().is_none());
    assert!(harness.engine.sync_memory_trust("no-such-id").unwrap().is_none());
}

#[test]
fn attribution_backfills_from_first_source_only_once() {
    let harness = TestHarness::new();
    let claim = harness
        .engine
        .create_memory(claim_input(
            "the auth token lives one hour",
            0.9,
            vec![SourceReference::new("url", "https://docs.example.com/auth", 0.9)],
        ))
        .unwrap();
    let attribution = claim.source_attribution.expect("backfilled attribution");
    assert_eq!(
        attribution.reference.as_deref(),
        Some("https://docs.example.com/auth")
    );
}
