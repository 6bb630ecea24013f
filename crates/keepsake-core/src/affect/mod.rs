//! Affect integration.
//!
//! The emotional subsystem lives outside this crate; the core consumes a
//! snapshot of its current state. Every insert freezes the snapshot onto
//! the record, so later mood shifts never rewrite a memory's emotional
//! context. Mood-congruent retrieval (Bower, 1981) scores a query-time
//! snapshot against that frozen context.

use serde::{Deserialize, Serialize};

/// A point-in-time reading of the agent's affective state.
///
/// All dimensions are optional: a missing dimension scores as neutral
/// rather than biasing congruence either way.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectSnapshot {
    /// Valence: -1.0 (negative) to 1.0 (positive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valence: Option<f64>,
    /// Arousal: 0.0 (calm) to 1.0 (activated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arousal: Option<f64>,
    /// Dominance: 0.0 (submissive) to 1.0 (in control)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominance: Option<f64>,
    /// Dominant emotion label ("joy", "frustration", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_emotion: Option<String>,
    /// Overall intensity: 0.0 to 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

impl AffectSnapshot {
    /// A fully neutral snapshot.
    pub fn neutral() -> Self {
        Self {
            valence: Some(0.0),
            arousal: Some(0.3),
            dominance: Some(0.5),
            primary_emotion: None,
            intensity: Some(0.0),
        }
    }
}

/// Provider of the current affective state.
pub trait AffectSource: Send + Sync {
    /// Sample the current state. Implementations should be cheap; the core
    /// calls this on every insert and every recall.
    fn current(&self) -> AffectSnapshot;
}

/// Affect source that always reports neutral. Used when no emotional
/// subsystem is wired in.
#[derive(Debug, Default)]
pub struct NeutralAffect;

impl AffectSource for NeutralAffect {
    fn current(&self) -> AffectSnapshot {
        AffectSnapshot::neutral()
    }
}

/// Mood congruence between a query-time snapshot and a memory's frozen
/// emotional context, in [0, 1].
///
/// Blend: valence closeness 0.6, arousal closeness 0.3, exact primary
/// emotion match 0.1. A dimension missing on either side contributes a
/// neutral 0.5 to its term.
pub fn mood_congruence(current: &AffectSnapshot, frozen: &AffectSnapshot) -> f64 {
    let valence = match (current.valence, frozen.valence) {
        // Valence spans [-1, 1], so the max distance is 2
        (Some(a), Some(b)) => 1.0 - ((a - b).abs() / 2.0).min(1.0),
        _ => 0.5,
    };
    let arousal = match (current.arousal, frozen.arousal) {
        (Some(a), Some(b)) => 1.0 - (a - b).abs().min(1.0),
        _ => 0.5,
    };
    let emotion = match (
        current.primary_emotion.as_deref(),
        frozen.primary_emotion.as_deref(),
    ) {
        (Some(a), Some(b)) => {
            if a.eq_ignore_ascii_case(b) {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.5,
    };
    0.6 * valence + 0.3 * arousal + 0.1 * emotion
}
