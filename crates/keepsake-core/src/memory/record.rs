//! Memory records - the fundamental unit of long-term storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::affect::AffectSnapshot;
use crate::memory::SourceReference;

// ============================================================================
// MEMORY TYPES
// ============================================================================

/// Kinds of memory the substrate stores
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// A lived event or experience
    #[default]
    Episodic,
    /// A fact or piece of knowledge
    Semantic,
    /// How-to knowledge
    Procedural,
    /// A plan or approach that worked (or failed)
    Strategic,
    /// A standing belief about the world
    Worldview,
    /// Something the agent wants to achieve
    Goal,
}

impl MemoryType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
            MemoryType::Procedural => "procedural",
            MemoryType::Strategic => "strategic",
            MemoryType::Worldview => "worldview",
            MemoryType::Goal => "goal",
        }
    }

    /// Parse from string name
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "episodic" => MemoryType::Episodic,
            "semantic" => MemoryType::Semantic,
            "procedural" => MemoryType::Procedural,
            "strategic" => MemoryType::Strategic,
            "worldview" => MemoryType::Worldview,
            "goal" => MemoryType::Goal,
            _ => MemoryType::Episodic,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// MEMORY STATUS
// ============================================================================

/// Lifecycle status of a memory.
///
/// Transitions are one-directional: active memories may be archived or
/// invalidated, and nothing ever moves back to active automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    /// In circulation, candidate for recall
    #[default]
    Active,
    /// Retired but retained
    Archived,
    /// Known wrong or superseded
    Invalidated,
}

impl MemoryStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Active => "active",
            MemoryStatus::Archived => "archived",
            MemoryStatus::Invalidated => "invalidated",
        }
    }

    /// Parse from string name
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "archived" => MemoryStatus::Archived,
            "invalidated" => MemoryStatus::Invalidated,
            _ => MemoryStatus::Active,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: MemoryStatus) -> bool {
        matches!(
            (self, next),
            (
                MemoryStatus::Active,
                MemoryStatus::Archived | MemoryStatus::Invalidated
            )
        )
    }
}

impl std::fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TYPED METADATA
// ============================================================================

/// Per-type metadata bag.
///
/// A tagged union rather than a schemaless map: a semantic memory without a
/// confidence value is a compile error, not a read-time surprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypedMetadata {
    /// Event context
    Episodic {
        /// Where the event happened, if anywhere nameable
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<String>,
        /// Who was involved
        #[serde(default)]
        participants: Vec<String>,
    },
    /// Knowledge with self-reported certainty and provenance
    Semantic {
        /// Self-reported certainty in [0, 1]; trust derivation caps this
        confidence: f64,
        /// Everything that vouches for this fact
        #[serde(default)]
        sources: Vec<SourceReference>,
    },
    /// Skill or procedure
    Procedural {
        /// Ordered steps
        #[serde(default)]
        steps: Vec<String>,
        /// Times the procedure succeeded when applied
        #[serde(default)]
        success_count: i64,
    },
    /// Plan-level knowledge
    Strategic {
        /// Situation the strategy applies to
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
    /// Standing belief
    Worldview {
        /// How firmly held, in [0, 1]
        conviction: f64,
    },
    /// Objective
    Goal {
        /// Relative priority in [0, 1]
        priority: f64,
        /// Free-form progress note
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<String>,
    },
}

impl TypedMetadata {
    /// The memory type this bag belongs to.
    pub fn memory_type(&self) -> MemoryType {
        match self {
            TypedMetadata::Episodic { .. } => MemoryType::Episodic,
            TypedMetadata::Semantic { .. } => MemoryType::Semantic,
            TypedMetadata::Procedural { .. } => MemoryType::Procedural,
            TypedMetadata::Strategic { .. } => MemoryType::Strategic,
            TypedMetadata::Worldview { .. } => MemoryType::Worldview,
            TypedMetadata::Goal { .. } => MemoryType::Goal,
        }
    }

    /// Empty bag for a type.
    pub fn default_for(memory_type: MemoryType) -> Self {
        match memory_type {
            MemoryType::Episodic => TypedMetadata::Episodic {
                location: None,
                participants: vec![],
            },
            MemoryType::Semantic => TypedMetadata::Semantic {
                confidence: 0.5,
                sources: vec![],
            },
            MemoryType::Procedural => TypedMetadata::Procedural {
                steps: vec![],
                success_count: 0,
            },
            MemoryType::Strategic => TypedMetadata::Strategic { context: None },
            MemoryType::Worldview => TypedMetadata::Worldview { conviction: 0.5 },
            MemoryType::Goal => TypedMetadata::Goal {
                priority: 0.5,
                progress: None,
            },
        }
    }
}

// ============================================================================
// MEMORY RECORD
// ============================================================================

/// A long-term memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Kind of memory
    pub memory_type: MemoryType,
    /// Lifecycle status
    pub status: MemoryStatus,
    /// The remembered content
    pub content: String,
    /// Embedding vector, always the store's configured dimension
    pub embedding: Vec<f32>,
    /// Salience in [0, 1]
    pub importance: f64,
    /// Derived reliability in [0, 1]
    pub trust_level: f64,
    /// When trust was last derived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_updated_at: Option<DateTime<Utc>>,
    /// Primary provenance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_attribution: Option<SourceReference>,
    /// Times this memory has been touched
    pub access_count: i64,
    /// Last touch time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Per-memory decay constant (per day)
    pub decay_rate: f64,
    /// Affect snapshot frozen at creation, never rewritten
    pub emotional_context: AffectSnapshot,
    /// Type-specific metadata
    pub metadata: TypedMetadata,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last modified
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Semantic confidence, when this is a semantic memory.
    pub fn confidence(&self) -> Option<f64> {
        match &self.metadata {
            TypedMetadata::Semantic { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }

    /// Semantic source list, when this is a semantic memory.
    pub fn semantic_sources(&self) -> &[SourceReference] {
        match &self.metadata {
            TypedMetadata::Semantic { sources, .. } => sources,
            _ => &[],
        }
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for creating a long-term memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMemoryInput {
    /// Kind of memory
    pub memory_type: MemoryType,
    /// The content to remember
    pub content: String,
    /// Salience in [0, 1]
    #[serde(default = "default_importance")]
    pub importance: f64,
    /// Primary provenance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_attribution: Option<SourceReference>,
    /// Initial trust; derived later for semantic memories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_level: Option<f64>,
    /// Per-memory decay constant (per day)
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    /// Type-specific metadata; defaults to the empty bag for the type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TypedMetadata>,
}

fn default_importance() -> f64 {
    0.5
}

fn default_decay_rate() -> f64 {
    0.01
}

impl CreateMemoryInput {
    /// Minimal input for a memory of the given type.
    pub fn new(memory_type: MemoryType, content: impl Into<String>) -> Self {
        Self {
            memory_type,
            content: content.into(),
            importance: default_importance(),
            source_attribution: None,
            trust_level: None,
            decay_rate: default_decay_rate(),
            metadata: None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_type_roundtrip() {
        for memory_type in [
            MemoryType::Episodic,
            MemoryType::Semantic,
            MemoryType::Procedural,
            MemoryType::Strategic,
            MemoryType::Worldview,
            MemoryType::Goal,
        ] {
            assert_eq!(MemoryType::parse_name(memory_type.as_str()), memory_type);
        }
    }

    #[test]
    fn test_status_transitions_one_directional() {
        assert!(MemoryStatus::Active.can_transition_to(MemoryStatus::Archived));
        assert!(MemoryStatus::Active.can_transition_to(MemoryStatus::Invalidated));
        assert!(!MemoryStatus::Archived.can_transition_to(MemoryStatus::Active));
        assert!(!MemoryStatus::Invalidated.can_transition_to(MemoryStatus::Active));
        assert!(!MemoryStatus::Archived.can_transition_to(MemoryStatus::Invalidated));
    }

    #[test]
    fn test_metadata_matches_type() {
        for memory_type in [
            MemoryType::Episodic,
            MemoryType::Semantic,
            MemoryType::Procedural,
            MemoryType::Strategic,
            MemoryType::Worldview,
            MemoryType::Goal,
        ] {
            assert_eq!(
                TypedMetadata::default_for(memory_type).memory_type(),
                memory_type
            );
        }
    }

    #[test]
    fn test_metadata_json_tagging() {
        let bag = TypedMetadata::Semantic {
            confidence: 0.9,
            sources: vec![],
        };
        let json = serde_json::to_string(&bag).unwrap();
        assert!(json.contains(r#""kind":"semantic""#));
        let back: TypedMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bag);
    }

    #[test]
    fn test_create_input_deny_unknown_fields() {
        let json = r#"{"memoryType": "semantic", "content": "x", "surprise": 1}"#;
        let result: Result<CreateMemoryInput, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
