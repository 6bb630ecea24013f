//! Source references - normalized provenance value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where a piece of knowledge came from.
///
/// Two references describe the same source when their canonical keys match;
/// on a collision the most-recently-observed reference wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    /// Source kind ("url", "conversation", "tool", "working_memory", ...)
    pub kind: String,
    /// Stable identifier within the kind (URL, file path, item id)
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Human-readable label when no stable ref exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Author or originator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// When the source was observed
    pub observed_at: DateTime<Utc>,
    /// Trust in the source itself, clamped to [0, 1]
    pub trust: f64,
    /// Hash of the source content, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl SourceReference {
    /// Create a minimal reference observed now.
    pub fn new(kind: impl Into<String>, reference: impl Into<String>, trust: f64) -> Self {
        Self {
            kind: kind.into(),
            reference: Some(reference.into()),
            label: None,
            author: None,
            observed_at: Utc::now(),
            trust: trust.clamp(0.0, 1.0),
            content_hash: None,
        }
    }

    /// Canonical dedup key: ref, else label, else a hash of the whole object.
    pub fn canonical_key(&self) -> String {
        if let Some(r) = self.reference.as_deref().filter(|r| !r.is_empty()) {
            return r.to_string();
        }
        if let Some(l) = self.label.as_deref().filter(|l| !l.is_empty()) {
            return l.to_string();
        }
        let serialized = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        hex::encode(hasher.finalize())
    }
}
