//! Graph transport over the Neo4j Bolt protocol. Driver rows are extracted
//! into `GraphValue`s per RETURN alias so the rest of the pipeline never
//! touches driver types.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use neo4rs::{query, Graph, Node, Path, Relation, Row, UnboundedRelation};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{BackendError, GraphQueryOutput, GraphTransport, QueryStatistics};
use crate::graph::{GraphNode, GraphRelationship, GraphRow, GraphValue, PathValue};
use crate::query::QuerySpec;

pub struct Neo4jTransport {
    uri: String,
    user: String,
    password: String,
    graph: RwLock<Option<Graph>>,
}

impl Neo4jTransport {
    /// Create a transport without connecting. The first `reconnect` (driven
    /// by the executor) establishes the session.
    pub fn new(
        uri: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            user: user.into(),
            password: password.into(),
            graph: RwLock::new(None),
        }
    }

    fn classify(err: neo4rs::Error) -> BackendError {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("defunct connection")
            || lower.contains("connection reset")
            || lower.contains("broken pipe")
        {
            BackendError::Transient { message, defunct: true }
        } else if lower.contains("io error") || lower.contains("connection") {
            BackendError::Transient { message, defunct: false }
        } else {
            BackendError::Query(message)
        }
    }
}

#[async_trait]
impl GraphTransport for Neo4jTransport {
    async fn execute(&self, spec: &QuerySpec) -> Result<GraphQueryOutput, BackendError> {
        let started = Instant::now();
        let guard = self.graph.read().await;
        let graph = guard
            .as_ref()
            .ok_or_else(|| BackendError::Unavailable("graph client not connected".into()))?;

        let mut q = query(&spec.text);
        for (name, value) in &spec.params {
            q = q.param(name.as_str(), value.clone());
        }

        let aliases = return_aliases(&spec.text);
        debug!(query = %spec.text, ?aliases, "running graph query");

        let mut stream = graph.execute(q).await.map_err(Self::classify)?;
        let mut rows: Vec<GraphRow> = Vec::new();
        while let Some(row) = stream.next().await.map_err(Self::classify)? {
            rows.push(extract_row(&row, &aliases));
        }

        Ok(GraphQueryOutput {
            rows,
            execution_time: started.elapsed().as_secs_f64(),
            statistics: QueryStatistics::default(),
        })
    }

    async fn is_connected(&self) -> bool {
        self.graph.read().await.is_some()
    }

    async fn reconnect(&self) -> Result<(), BackendError> {
        info!(uri = %self.uri, "connecting graph client");
        let graph = Graph::new(self.uri.as_str(), self.user.as_str(), self.password.as_str())
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        *self.graph.write().await = Some(graph);
        Ok(())
    }
}

/// Extract each aliased column of a row, preferring graph entities over
/// scalars. Columns the driver cannot decode become JSON nulls rather than
/// failing the whole row.
fn extract_row(row: &Row, aliases: &[String]) -> GraphRow {
    let mut out = GraphRow::new();
    for alias in aliases {
        let value = if let Ok(node) = row.get::<Node>(alias.as_str()) {
            GraphValue::Node(convert_node(&node))
        } else if let Ok(rel) = row.get::<Relation>(alias.as_str()) {
            GraphValue::Relationship(convert_relation(&rel))
        } else if let Ok(path) = row.get::<Path>(alias.as_str()) {
            GraphValue::Path(convert_path(&path))
        } else if let Ok(scalar) = row.get::<Value>(alias.as_str()) {
            GraphValue::Scalar(scalar)
        } else {
            warn!(alias, "could not decode graph column");
            GraphValue::Scalar(Value::Null)
        };
        out.push((alias.clone(), value));
    }
    out
}

fn convert_node(node: &Node) -> GraphNode {
    let mut properties = BTreeMap::new();
    for key in node.keys() {
        let value = node.get::<Value>(key).unwrap_or(Value::Null);
        properties.insert(key.to_string(), value);
    }
    GraphNode {
        id: format!("n:{}", node.id()),
        labels: node.labels().iter().map(|l| l.to_string()).collect(),
        properties,
    }
}

fn convert_relation(rel: &Relation) -> GraphRelationship {
    let mut properties = BTreeMap::new();
    for key in rel.keys() {
        let value = rel.get::<Value>(key).unwrap_or(Value::Null);
        properties.insert(key.to_string(), value);
    }
    GraphRelationship {
        id: format!("r:{}", rel.id()),
        rel_type: rel.typ().to_string(),
        start: format!("n:{}", rel.start_node_id()),
        end: format!("n:{}", rel.end_node_id()),
        properties,
    }
}

fn convert_path(path: &Path) -> PathValue {
    let nodes: Vec<GraphNode> = path.nodes().iter().map(convert_node).collect();
    let relationships = path
        .rels()
        .iter()
        .zip(walk_endpoints(&nodes))
        .map(|(rel, (start, end))| convert_hop(rel, start, end))
        .collect();
    PathValue { nodes, relationships }
}

/// Endpoint ids for each hop of a path walk: hop `i` connects node `i` to
/// node `i + 1`. The driver's path relationships carry no endpoint ids of
/// their own, so they are recovered from the node order.
fn walk_endpoints(nodes: &[GraphNode]) -> Vec<(String, String)> {
    nodes.windows(2).map(|pair| (pair[0].id.clone(), pair[1].id.clone())).collect()
}

fn convert_hop(rel: &UnboundedRelation, start: String, end: String) -> GraphRelationship {
    let mut properties = BTreeMap::new();
    for key in rel.keys() {
        let value = rel.get::<Value>(key).unwrap_or(Value::Null);
        properties.insert(key.to_string(), value);
    }
    GraphRelationship {
        id: format!("r:{}", rel.id()),
        rel_type: rel.typ().to_string(),
        start,
        end,
        properties,
    }
}

/// Parse the aliases of the final RETURN clause of a Cypher statement.
/// Splits on top-level commas only, and uses the ` AS alias` name when one
/// is present, the raw expression otherwise.
pub fn return_aliases(cypher: &str) -> Vec<String> {
    let upper = cypher.to_uppercase();
    let Some(pos) = upper.rfind("RETURN ") else {
        return Vec::new();
    };
    let mut clause = &cypher[pos + "RETURN ".len()..];
    let clause_upper = &upper[pos + "RETURN ".len()..];

    // Strip trailing ORDER BY / SKIP / LIMIT.
    let mut end = clause.len();
    for terminator in [" ORDER BY ", " SKIP ", " LIMIT "] {
        if let Some(t) = clause_upper.find(terminator) {
            end = end.min(t);
        }
    }
    clause = &clause[..end];

    let mut aliases = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let bytes = clause.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                aliases.push(item_alias(&clause[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    aliases.push(item_alias(&clause[start..]));
    aliases
}

fn item_alias(item: &str) -> String {
    let trimmed = item.trim();
    let upper = trimmed.to_uppercase();
    if let Some(pos) = upper.rfind(" AS ") {
        trimmed[pos + 4..].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_endpoints_pair_consecutive_nodes() {
        let nodes: Vec<GraphNode> = ["n:1", "n:2", "n:3"]
            .iter()
            .map(|id| GraphNode {
                id: id.to_string(),
                labels: vec!["State".to_string()],
                properties: BTreeMap::new(),
            })
            .collect();
        assert_eq!(
            walk_endpoints(&nodes),
            vec![
                ("n:1".to_string(), "n:2".to_string()),
                ("n:2".to_string(), "n:3".to_string()),
            ]
        );
        // A single-node path has no hops.
        assert!(walk_endpoints(&nodes[..1]).is_empty());
    }

    #[test]
    fn test_return_aliases_simple() {
        let aliases = return_aliases("MATCH (n) RETURN n.name AS name, n.year LIMIT 5");
        assert_eq!(aliases, vec!["name", "n.year"]);
    }

    #[test]
    fn test_return_aliases_ignores_nested_commas() {
        let aliases = return_aliases(
            "MATCH (s)-[r]->(m) RETURN s AS state_node, \
             [h IN history | {year: h.year, value: h.value}][0..3] AS previous_values \
             ORDER BY s.name LIMIT 10",
        );
        assert_eq!(aliases, vec!["state_node", "previous_values"]);
    }

    #[test]
    fn test_return_aliases_uses_last_return() {
        let cypher = "MATCH (a) WITH a, count(a) AS total \
                      MATCH (b) RETURN b AS node, total ORDER BY total DESC";
        assert_eq!(return_aliases(cypher), vec!["node", "total"]);
    }

    #[test]
    fn test_return_aliases_without_return() {
        assert!(return_aliases("MATCH (n) DELETE n").is_empty());
    }
}
