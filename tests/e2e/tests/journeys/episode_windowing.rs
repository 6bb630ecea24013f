//! Journey: episode segmentation over a synthetic timeline.
//!
//! Drives the segmenter directly with explicit timestamps, since the
//! engine always assigns at insertion time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use keepsake_core::episodes::EpisodeSegmenter;
use keepsake_core::locks::NamedLocks;
use keepsake_core::{
    AffectSnapshot, MemoryRecord, MemoryStatus, MemoryType, Store, TypedMetadata,
};

const DIMS: usize = 8;

fn open_segmenter() -> (EpisodeSegmenter, Arc<Store>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(Some(dir.path().join("episodes.db")), DIMS).unwrap());
    let segmenter = EpisodeSegmenter::new(
        Arc::clone(&store),
        NamedLocks::new(Arc::clone(&store)),
        30,
    );
    (segmenter, store, dir)
}

fn seed(store: &Store, id: &str, created_at: DateTime<Utc>) {
    let mut embedding = vec![0.0f32; DIMS];
    embedding[0] = 1.0;
    store
        .insert_memory(&MemoryRecord {
            id: id.to_string(),
            memory_type: MemoryType::Episodic,
            status: MemoryStatus::Active,
            content: format!("event {}", id),
            embedding,
            importance: 0.5,
            trust_level: 0.5,
            trust_updated_at: None,
            source_attribution: None,
            access_count: 0,
            last_accessed: None,
            decay_rate: 0.01,
            emotional_context: AffectSnapshot::neutral(),
            metadata: TypedMetadata::default_for(MemoryType::Episodic),
            created_at,
            updated_at: created_at,
        })
        .unwrap();
}

#[test]
fn gap_over_thirty_minutes_splits_episodes() {
    let (segmenter, store, _dir) = open_segmenter();
    let start = Utc::now() - Duration::hours(2);

    let a = start;
    let b = start + Duration::minutes(31);
    let c = b + Duration::minutes(5);
    for (id, at) in [("a", a), ("b", b), ("c", c)] {
        seed(&store, id, at);
    }

    let episode_a = segmenter.assign("a", a).unwrap();
    let episode_b = segmenter.assign("b", b).unwrap();
    assert_ne!(episode_a, episode_b);
    assert_eq!(segmenter.episode_count().unwrap(), 2);

    // C lands 5 minutes after B: same episode, next sequence number
    let episode_c = segmenter.assign("c", c).unwrap();
    assert_eq!(episode_b, episode_c);
    assert_eq!(segmenter.episode_count().unwrap(), 2);

    let members = segmenter.members(&episode_b).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].memory_id, "b");
    assert_eq!(members[0].seq, 1);
    assert_eq!(members[1].memory_id, "c");
    assert_eq!(members[1].seq, 2);
}

#[test]
fn closed_episode_ends_at_its_latest_member() {
    let (segmenter, store, _dir) = open_segmenter();
    let start = Utc::now() - Duration::hours(3);

    let a = start;
    let b = start + Duration::minutes(10);
    let late = b + Duration::minutes(45);
    for (id, at) in [("a", a), ("b", b), ("late", late)] {
        seed(&store, id, at);
    }
    let first = segmenter.assign("a", a).unwrap();
    segmenter.assign("b", b).unwrap();
    segmenter.assign("late", late).unwrap();

    let closed = segmenter.get_episode(&first).unwrap().unwrap();
    // ended_at is the last activity inside the episode, not the close time
    assert_eq!(closed.ended_at, Some(b));
}

#[test]
fn at_most_one_open_episode() {
    let (segmenter, store, _dir) = open_segmenter();
    let start = Utc::now() - Duration::hours(2);

    for i in 0..4 {
        let id = format!("m{}", i);
        // Alternating long gaps force repeated episode turnover
        let at = start + Duration::minutes(40 * i);
        seed(&store, &id, at);
        segmenter.assign(&id, at).unwrap();
        assert!(segmenter.current_open().unwrap().is_some());
    }
    assert_eq!(segmenter.episode_count().unwrap(), 4);
}

#[test]
fn sequence_restarts_in_each_new_episode() {
    let (segmenter, store, _dir) = open_segmenter();
    let start = Utc::now() - Duration::hours(2);

    let times = [
        start,
        start + Duration::minutes(5),
        start + Duration::minutes(50),
    ];
    for (i, at) in times.iter().enumerate() {
        let id = format!("m{}", i);
        seed(&store, &id, *at);
        segmenter.assign(&id, *at).unwrap();
    }

    let open = segmenter.current_open().unwrap().unwrap();
    let members = segmenter.members(&open.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].seq, 1);
}
