//! Narrow graph interface.
//!
//! The core never needs a general graph query language; it issues a fixed
//! set of traversals (support/contradict lookups, concept links) through
//! this trait. The bundled implementation is an adjacency store in the
//! shared SQLite database, keyed by (label, key) and
//! (type, from, to).

use std::sync::Arc;

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::Store;

/// Node label for memory records.
pub const LABEL_MEMORY: &str = "memory";
/// Node label for abstract concepts.
pub const LABEL_CONCEPT: &str = "concept";

/// Edge type: memory supports a worldview belief.
pub const EDGE_SUPPORTS: &str = "supports";
/// Edge type: memory contradicts a worldview belief.
pub const EDGE_CONTRADICTS: &str = "contradicts";
/// Edge type: memory mentions a concept.
pub const EDGE_MENTIONS: &str = "mentions";

/// A stored edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRow {
    /// Relationship type
    pub edge_type: String,
    /// Source node (label, key)
    pub from: (String, String),
    /// Target node (label, key)
    pub to: (String, String),
    /// Free-form edge properties
    pub properties: serde_json::Value,
}

impl EdgeRow {
    /// Numeric `strength` property, defaulting to 1.0.
    pub fn strength(&self) -> f64 {
        self.properties
            .get("strength")
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0)
    }
}

/// Fixed-shape edge query: any combination of type, source, and target.
#[derive(Debug, Clone, Default)]
pub struct EdgePattern {
    /// Restrict to this relationship type
    pub edge_type: Option<String>,
    /// Restrict to this source node
    pub from: Option<(String, String)>,
    /// Restrict to this target node
    pub to: Option<(String, String)>,
}

impl EdgePattern {
    /// Edges of a type leaving one node.
    pub fn outgoing(edge_type: &str, from_label: &str, from_key: &str) -> Self {
        Self {
            edge_type: Some(edge_type.to_string()),
            from: Some((from_label.to_string(), from_key.to_string())),
            to: None,
        }
    }
}

/// The narrow capability set the core assumes.
pub trait GraphStore: Send + Sync {
    /// Ensure a node exists.
    fn upsert_node(&self, label: &str, key: &str) -> Result<()>;
    /// Create (or replace) a typed edge with properties.
    fn create_edge(
        &self,
        from: (&str, &str),
        to: (&str, &str),
        edge_type: &str,
        properties: serde_json::Value,
    ) -> Result<()>;
    /// Fetch edges matching a pattern.
    fn query_edges(&self, pattern: &EdgePattern) -> Result<Vec<EdgeRow>>;
}

/// Adjacency-list implementation over the shared store.
pub struct SqliteGraph {
    store: Arc<Store>,
}

impl SqliteGraph {
    /// Create a graph view over a store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl GraphStore for SqliteGraph {
    fn upsert_node(&self, label: &str, key: &str) -> Result<()> {
        let writer = self.store.writer()?;
        writer.execute(
            "INSERT OR IGNORE INTO graph_nodes (label, key, created_at) VALUES (?1, ?2, ?3)",
            params![label, key, Utc::now()],
        )?;
        Ok(())
    }

    fn create_edge(
        &self,
        from: (&str, &str),
        to: (&str, &str),
        edge_type: &str,
        properties: serde_json::Value,
    ) -> Result<()> {
        let writer = self.store.writer()?;
        writer.execute(
            "INSERT OR REPLACE INTO graph_edges
             (edge_type, from_label, from_key, to_label, to_key, properties, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                edge_type,
                from.0,
                from.1,
                to.0,
                to.1,
                properties.to_string(),
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    fn query_edges(&self, pattern: &EdgePattern) -> Result<Vec<EdgeRow>> {
        let mut sql = String::from(
            "SELECT edge_type, from_label, from_key, to_label, to_key, properties
             FROM graph_edges WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(edge_type) = &pattern.edge_type {
            sql.push_str(" AND edge_type = ?");
            args.push(Box::new(edge_type.clone()));
        }
        if let Some((label, key)) = &pattern.from {
            sql.push_str(" AND from_label = ? AND from_key = ?");
            args.push(Box::new(label.clone()));
            args.push(Box::new(key.clone()));
        }
        if let Some((label, key)) = &pattern.to {
            sql.push_str(" AND to_label = ? AND to_key = ?");
            args.push(Box::new(label.clone()));
            args.push(Box::new(key.clone()));
        }

        let reader = self.store.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                Ok(EdgeRow {
                    edge_type: row.get(0)?,
                    from: (row.get(1)?, row.get(2)?),
                    to: (row.get(3)?, row.get(4)?),
                    properties: serde_json::from_str(&row.get::<_, String>(5)?)
                        .unwrap_or(serde_json::Value::Null),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
