//! Normalized graph output decoupled from the driver's row types. The
//! transport extracts driver values into `GraphValue`s; everything downstream
//! works on these.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A node extracted from a graph result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    /// Stable id, prefixed `n:`.
    pub id: String,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

/// A relationship extracted from a graph result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphRelationship {
    /// Stable id, prefixed `r:`.
    pub id: String,
    pub rel_type: String,
    pub start: String,
    pub end: String,
    pub properties: BTreeMap<String, Value>,
}

/// A traversal path: its nodes in order plus the relationships walked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathValue {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

/// One value in a graph result row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GraphValue {
    Node(GraphNode),
    Relationship(GraphRelationship),
    Path(PathValue),
    Scalar(Value),
}

/// One result row: RETURN aliases paired with their values, in query order.
pub type GraphRow = Vec<(String, GraphValue)>;

/// Relationship counts by type, split by direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationshipSummary {
    pub outgoing: BTreeMap<String, usize>,
    pub incoming: BTreeMap<String, usize>,
}

/// A node in a collected structure, with the relationship counts accumulated
/// while collecting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
    pub summary: RelationshipSummary,
}

/// The node-id walk of one returned path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathRecord {
    pub node_ids: Vec<String>,
    /// Hop count, equal to the number of relationships walked.
    pub length: usize,
}

/// Deduplicated nodes, relationships, and path walks collected across all
/// rows of a graph result. Flat scalar columns are not part of the
/// structure; they stay in the row-level JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStructure {
    /// Keyed by node id. A node appearing in many rows is stored once.
    pub nodes: BTreeMap<String, NodeRecord>,
    pub relationships: Vec<GraphRelationship>,
    pub paths: Vec<PathRecord>,
}

impl GraphStructure {
    /// Collect every node, relationship, and path mentioned in the rows.
    /// Both endpoints of each relationship are materialized as nodes even
    /// when the query did not return them directly; such placeholders carry
    /// no labels or properties until a later value fills them in.
    pub fn from_rows(rows: &[GraphRow]) -> Self {
        let mut structure = Self::default();
        let mut seen_rels: HashSet<String> = HashSet::new();

        for row in rows {
            for (alias, value) in row {
                match value {
                    GraphValue::Node(node) => structure.insert_node(node),
                    GraphValue::Relationship(rel) => {
                        structure.insert_relationship(rel, &mut seen_rels)
                    }
                    GraphValue::Path(path) => {
                        for node in &path.nodes {
                            structure.insert_node(node);
                        }
                        for rel in &path.relationships {
                            structure.insert_relationship(rel, &mut seen_rels);
                        }
                        structure.paths.push(PathRecord {
                            node_ids: path.nodes.iter().map(|n| n.id.clone()).collect(),
                            length: path.relationships.len(),
                        });
                    }
                    GraphValue::Scalar(Value::Null) => {
                        warn!(alias, "null graph value, skipping");
                    }
                    GraphValue::Scalar(_) => {}
                }
            }
        }

        structure
    }

    fn insert_node(&mut self, node: &GraphNode) {
        let entry = self.nodes.entry(node.id.clone()).or_insert_with(|| placeholder(&node.id));
        // A placeholder endpoint gets upgraded when the full node shows up;
        // accumulated relationship counts are kept.
        if entry.labels.is_empty() && !node.labels.is_empty() {
            entry.labels = node.labels.clone();
            entry.properties = node.properties.clone();
        }
    }

    fn insert_relationship(&mut self, rel: &GraphRelationship, seen: &mut HashSet<String>) {
        if !seen.insert(rel.id.clone()) {
            return;
        }
        let start = self.nodes.entry(rel.start.clone()).or_insert_with(|| placeholder(&rel.start));
        *start.summary.outgoing.entry(rel.rel_type.clone()).or_default() += 1;
        let end = self.nodes.entry(rel.end.clone()).or_insert_with(|| placeholder(&rel.end));
        *end.summary.incoming.entry(rel.rel_type.clone()).or_default() += 1;
        self.relationships.push(rel.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

fn placeholder(id: &str) -> NodeRecord {
    NodeRecord {
        id: id.to_string(),
        labels: Vec::new(),
        properties: BTreeMap::new(),
        summary: RelationshipSummary::default(),
    }
}

/// Flatten a graph row into a JSON object keyed by RETURN alias. Nodes and
/// relationships become their property maps; paths become the ordered list
/// of node property maps.
pub fn row_to_json(row: &GraphRow) -> Value {
    let mut object = serde_json::Map::new();
    for (alias, value) in row {
        let json = match value {
            GraphValue::Node(node) => props_to_json(&node.properties),
            GraphValue::Relationship(rel) => props_to_json(&rel.properties),
            GraphValue::Path(path) => Value::Array(
                path.nodes.iter().map(|node| props_to_json(&node.properties)).collect(),
            ),
            GraphValue::Scalar(scalar) => scalar.clone(),
        };
        object.insert(alias.clone(), json);
    }
    Value::Object(object)
}

fn props_to_json(properties: &BTreeMap<String, Value>) -> Value {
    Value::Object(properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}
