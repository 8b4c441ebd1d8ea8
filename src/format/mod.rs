//! Turns raw backend results into display-ready output: tabular rows for
//! the relational side, node cards for the graph side. Graph cards are
//! enriched with static geographic knowledge so sparse query results still
//! show meaningful relationships.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::ExecutionResult;
use crate::graph::{GraphRow, GraphStructure, RelationshipKnowledge, RelationshipSummary};

/// How a backend's rows should be rendered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    Table,
    Graph,
}

/// One graph entity prepared for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeCard {
    pub node_id: String,
    /// Rendered as `[:Label]` or `[:A:B]`.
    pub labels: String,
    pub name: String,
    /// Up to three `key: value` strings.
    pub properties: Vec<String>,
    /// Up to three arrow-notated relationship summaries.
    pub relationships: Vec<String>,
}

/// Display-ready output of one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendOutcome {
    pub display: DisplayFormat,
    pub rows: Vec<Value>,
    /// Backend-reported total, which stays intact when rows are truncated
    /// for display.
    pub row_count: usize,
    pub execution_time: f64,
    pub error: Option<String>,
    pub truncated: bool,
}

pub struct ResultFormatter {
    knowledge: RelationshipKnowledge,
}

impl ResultFormatter {
    pub fn new(knowledge: RelationshipKnowledge) -> Self {
        Self { knowledge }
    }

    /// Relational results are always tabular. Rows beyond `max_results` are
    /// dropped; `row_count` keeps the backend total.
    pub fn format_relational(
        &self,
        result: &ExecutionResult,
        max_results: usize,
    ) -> BackendOutcome {
        let truncated = result.rows.len() > max_results;
        BackendOutcome {
            display: DisplayFormat::Table,
            rows: result.rows.iter().take(max_results).cloned().collect(),
            row_count: result.row_count,
            execution_time: result.execution_time,
            error: result.error.clone(),
            truncated,
        }
    }

    /// Choose the graph rendering: node cards when the result carries graph
    /// entities (directly, or reconstructable from `*_node` columns or
    /// entity-shaped flat rows), a plain table otherwise.
    pub fn format_graph(
        &self,
        result: &ExecutionResult,
        rows: &[GraphRow],
        structure: &GraphStructure,
        max_results: usize,
    ) -> BackendOutcome {
        if !structure.is_empty() {
            let cards = self.cards_from_structure(structure);
            return self.graph_outcome(result, cards, max_results);
        }

        let flat: Vec<Value> = rows.iter().map(crate::graph::structure::row_to_json).collect();

        let has_node_fields = flat.iter().any(|record| {
            record.as_object().is_some_and(|obj| {
                obj.iter().any(|(k, v)| k.ends_with("_node") && !v.is_null())
            })
        });
        if has_node_fields {
            let cards = self.cards_from_node_fields(&flat);
            return self.graph_outcome(result, cards, max_results);
        }

        let truncated = flat.len() > max_results;
        BackendOutcome {
            display: DisplayFormat::Table,
            rows: flat.into_iter().take(max_results).collect(),
            row_count: result.row_count,
            execution_time: result.execution_time,
            error: result.error.clone(),
            truncated,
        }
    }

    fn graph_outcome(
        &self,
        result: &ExecutionResult,
        cards: Vec<NodeCard>,
        max_results: usize,
    ) -> BackendOutcome {
        let truncated = cards.len() > max_results;
        let rows = cards
            .into_iter()
            .take(max_results)
            .filter_map(|card| serde_json::to_value(card).ok())
            .collect();
        BackendOutcome {
            display: DisplayFormat::Graph,
            rows,
            row_count: result.row_count,
            execution_time: result.execution_time,
            error: result.error.clone(),
            truncated,
        }
    }

    fn cards_from_structure(&self, structure: &GraphStructure) -> Vec<NodeCard> {
        structure
            .nodes
            .values()
            .map(|node| {
                let labels = if node.labels.is_empty() {
                    "[:Node]".to_string()
                } else {
                    format!("[:{}]", node.labels.join(":"))
                };
                let name = display_name(&node.properties).unwrap_or_else(|| node.id.clone());

                let mut relationships = if node.labels.iter().any(|l| l == "State") {
                    self.state_relationships(&name)
                } else if node.labels.iter().any(|l| l == "Measurement") {
                    vec![measurement_relationship(&node.properties)]
                } else {
                    Vec::new()
                };

                if relationships.is_empty() {
                    relationships = summarize_counts(&node.summary);
                }

                relationships.truncate(3);
                NodeCard {
                    node_id: node.id.clone(),
                    labels,
                    name,
                    properties: display_properties(&node.properties),
                    relationships,
                }
            })
            .collect()
    }

    /// Relationship summaries for a State, derived from static knowledge.
    /// Belt memberships take priority over borders and regions.
    fn state_relationships(&self, state_name: &str) -> Vec<String> {
        let mut belts = Vec::new();
        let mut others = Vec::new();
        let mut border_count = 0usize;
        let mut region: Option<String> = None;
        let mut shared = 0usize;

        for rel in self.knowledge.geographic_relationships(state_name) {
            match rel.rel_type.as_str() {
                "IN_CORN_BELT" | "IN_WHEAT_BELT" | "IN_COTTON_BELT" => {
                    belts.push(format!("→{}(1)", rel.rel_type));
                }
                "BORDERS" => border_count += 1,
                "IN_REGION" => region = Some(rel.target),
                "SHARES_REGION_WITH" => shared += 1,
                _ => {}
            }
        }

        if border_count > 0 {
            others.push(format!("→BORDERS({border_count})"));
        }
        if let Some(region) = region {
            others.push(format!("→IN_{}(1)", region.to_uppercase()));
        }
        if shared > 0 {
            others.push(format!("↔SHARES_REGION({shared})"));
        }

        belts.extend(others);
        belts.truncate(3);
        belts
    }

    fn cards_from_node_fields(&self, records: &[Value]) -> Vec<NodeCard> {
        records
            .iter()
            .filter_map(|record| {
                let obj = record.as_object()?;
                let node_fields: Vec<(&String, &Value)> =
                    obj.iter().filter(|(k, v)| k.ends_with("_node") && !v.is_null()).collect();

                // Column order follows the query's RETURN clause, so the
                // first node field is the query's primary entity.
                let Some((primary_key, primary_value)) = node_fields.first().copied() else {
                    return self.card_from_flat_record(record);
                };

                let entity = primary_key.trim_end_matches("_node");
                let entity_type = title_case(entity);
                let name = obj
                    .get(entity)
                    .or_else(|| obj.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string();

                let mut properties = Vec::new();
                let mut relationships = Vec::new();
                for (key, value) in obj {
                    if key.ends_with("_node") || key == entity || value.is_null() {
                        continue;
                    }
                    let formatted = format_value(value);
                    if ["connected", "related", "linked"].iter().any(|w| key.contains(w)) {
                        relationships.push(format!("→{}({formatted})", key.to_uppercase()));
                    } else {
                        properties.push(format!("{key}: {formatted}"));
                    }
                }
                for (other_key, _) in node_fields.iter().skip(1) {
                    let rel = other_key.trim_end_matches("_node").to_uppercase();
                    relationships.push(format!("→HAS_{rel}(1)"));
                }

                if relationships.is_empty() {
                    relationships = match entity_type.as_str() {
                        "State" => self.state_relationships(&name),
                        "Measurement" => {
                            vec![measurement_from_properties(&properties)]
                        }
                        _ => vec!["→CONNECTED(1)".to_string()],
                    };
                }

                relationships.truncate(3);
                properties.truncate(3);
                Some(NodeCard {
                    node_id: format!("n:{}", pseudo_id(primary_value)),
                    labels: format!("[:{entity_type}]"),
                    name,
                    properties,
                    relationships,
                })
            })
            .collect()
    }

    /// Best-effort card for a flat record with a recognizable primary
    /// entity. Returns None when no entity can be identified.
    fn card_from_flat_record(&self, record: &Value) -> Option<NodeCard> {
        let obj = record.as_object()?;

        let entity_keys = [
            ("state", "State"),
            ("state_name", "State"),
            ("farm", "Farm"),
            ("farm_name", "Farm"),
            ("supplier", "Supplier"),
            ("supplier_name", "Supplier"),
            ("name", "Entity"),
        ];
        let (name_key, entity_type) = entity_keys
            .iter()
            .find(|(key, _)| obj.get(*key).and_then(Value::as_str).is_some())?;
        let name = obj[*name_key].as_str()?.to_string();

        let mut properties = Vec::new();
        let mut relationships = Vec::new();
        for (key, value) in obj {
            if entity_keys.iter().any(|(k, _)| k == key) || value.is_null() {
                continue;
            }
            if ["connected", "supplies", "located", "borders", "related"]
                .iter()
                .any(|w| key.to_lowercase().contains(w))
            {
                let count = value.as_u64().unwrap_or(1);
                relationships.push(format!("→{}({count})", key.to_uppercase()));
            } else {
                properties.push(format!("{key}: {}", format_value(value)));
            }
        }
        if relationships.is_empty() {
            relationships.push("→MEASURED(1)".to_string());
        }

        properties.truncate(3);
        relationships.truncate(3);
        Some(NodeCard {
            node_id: format!("n:{}", pseudo_id(&Value::String(name.clone())) % 10_000),
            labels: format!("[:{entity_type}]"),
            name,
            properties,
            relationships,
        })
    }
}

fn display_name(properties: &BTreeMap<String, Value>) -> Option<String> {
    for key in ["name", "title", "label", "id"] {
        if let Some(value) = properties.get(key) {
            return Some(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
    }
    None
}

/// Up to three `key: value` strings, name-like keys excluded.
fn display_properties(properties: &BTreeMap<String, Value>) -> Vec<String> {
    properties
        .iter()
        .filter(|(key, _)| !["name", "title", "label", "id"].contains(&key.as_str()))
        .take(3)
        .map(|(key, value)| format!("{key}: {}", format_value(value)))
        .collect()
}

fn measurement_relationship(properties: &BTreeMap<String, Value>) -> String {
    let metric = properties.get("metric_type").and_then(Value::as_str).unwrap_or("");
    if metric.contains("Income") {
        "←MEASURES_INCOME(1)".to_string()
    } else if metric.contains("Expense") {
        "←MEASURES_EXPENSES(1)".to_string()
    } else {
        "←MEASURES(1)".to_string()
    }
}

fn measurement_from_properties(properties: &[String]) -> String {
    if properties.iter().any(|p| p.contains("Income")) {
        "←MEASURES_INCOME(1)".to_string()
    } else if properties.iter().any(|p| p.contains("Expense")) {
        "←MEASURES_EXPENSES(1)".to_string()
    } else {
        "←MEASURES(1)".to_string()
    }
}

/// Per-direction relationship summaries, suppressing HAS_MEASUREMENT unless
/// it is the only relationship a node has.
fn summarize_counts(summary: &RelationshipSummary) -> Vec<String> {
    let mut summaries = Vec::new();
    for (rel_type, count) in &summary.outgoing {
        if rel_type != "HAS_MEASUREMENT" {
            summaries.push(format!("→{rel_type}({count})"));
        }
    }
    for (rel_type, count) in &summary.incoming {
        if rel_type != "HAS_MEASUREMENT" {
            summaries.push(format!("←{rel_type}({count})"));
        }
    }

    if summaries.is_empty() {
        if let Some(count) = summary.outgoing.get("HAS_MEASUREMENT") {
            summaries.push(format!("→HAS_MEASUREMENT({count})"));
        }
        if let Some(count) = summary.incoming.get("HAS_MEASUREMENT") {
            summaries.push(format!("←HAS_MEASUREMENT({count})"));
        }
    }
    summaries
}

/// Render a JSON value for display, with thousands separators for numbers
/// at or above 1000.
fn format_value(value: &Value) -> String {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i.abs() >= 1000 {
                    return group_thousands(&i.to_string());
                }
                i.to_string()
            } else if let Some(f) = n.as_f64() {
                if f.abs() >= 1000.0 {
                    let sign = if f < 0.0 { "-" } else { "" };
                    let abs = f.abs();
                    let whole = format!("{:.0}", abs.trunc());
                    let frac = format!("{:.2}", abs.fract());
                    return format!("{sign}{}.{}", group_thousands(&whole), &frac[2..]);
                }
                n.to_string()
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = digits.strip_prefix('-').map_or(("", digits), |d| ("-", d));
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped}")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pseudo_id(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    hasher.finish() % 100_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::QueryStatistics;
    use crate::graph::{GraphNode, GraphValue};
    use serde_json::json;

    fn ok_result(rows: Vec<Value>) -> ExecutionResult {
        let row_count = rows.len();
        ExecutionResult {
            rows,
            execution_time: 0.01,
            row_count,
            error: None,
            statistics: QueryStatistics::default(),
        }
    }

    fn formatter() -> ResultFormatter {
        ResultFormatter::new(RelationshipKnowledge::new())
    }

    fn state_node(id: &str, name: &str) -> GraphValue {
        let mut properties = BTreeMap::new();
        properties.insert("name".to_string(), json!(name));
        properties.insert("population".to_string(), json!(3_190_369));
        GraphValue::Node(GraphNode {
            id: format!("n:{id}"),
            labels: vec!["State".to_string()],
            properties,
        })
    }

    #[test]
    fn test_graph_entities_force_graph_display() {
        let rows = vec![vec![("s".to_string(), state_node("1", "Iowa"))]];
        let result = ok_result(vec![]);
        let structure = GraphStructure::from_rows(&rows);
        let outcome = formatter().format_graph(&result, &rows, &structure, 50);

        assert_eq!(outcome.display, DisplayFormat::Graph);
        assert_eq!(outcome.rows.len(), 1);
        let card = &outcome.rows[0];
        assert_eq!(card["labels"], json!("[:State]"));
        assert_eq!(card["name"], json!("Iowa"));
        // Corn belt membership comes from static knowledge, not the query.
        assert!(card["relationships"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r.as_str().unwrap().contains("IN_CORN_BELT")));
        // Population gets thousands separators.
        assert!(card["properties"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p.as_str().unwrap().contains("3,190,369")));
    }

    #[test]
    fn test_empty_graph_rows_fall_back_to_table() {
        let rows = vec![vec![
            ("total".to_string(), GraphValue::Scalar(json!(12))),
            ("metric".to_string(), GraphValue::Scalar(json!("Total Income"))),
        ]];
        let result = ok_result(vec![]);
        let structure = GraphStructure::from_rows(&rows);
        let outcome = formatter().format_graph(&result, &rows, &structure, 50);

        assert_eq!(outcome.display, DisplayFormat::Table);
        assert_eq!(outcome.rows[0]["total"], json!(12));
    }

    #[test]
    fn test_node_field_columns_reconstruct_graph() {
        let rows = vec![vec![
            ("state_node".to_string(), GraphValue::Scalar(json!({"name": "Iowa"}))),
            ("state".to_string(), GraphValue::Scalar(json!("Iowa"))),
            ("value".to_string(), GraphValue::Scalar(json!(25_000))),
        ]];
        let result = ok_result(vec![]);
        let structure = GraphStructure::from_rows(&rows);
        let outcome = formatter().format_graph(&result, &rows, &structure, 50);

        assert_eq!(outcome.display, DisplayFormat::Graph);
        let card = &outcome.rows[0];
        assert_eq!(card["labels"], json!("[:State]"));
        assert_eq!(card["name"], json!("Iowa"));
        assert!(card["node_id"].as_str().unwrap().starts_with("n:"));
    }

    #[test]
    fn test_primary_node_field_follows_column_order() {
        // Two node columns: the one listed first in the query wins, even
        // when it sorts later alphabetically.
        let rows = vec![vec![
            ("state_node".to_string(), GraphValue::Scalar(json!({"name": "Iowa"}))),
            ("measurement_node".to_string(), GraphValue::Scalar(json!({"value": 1}))),
            ("state".to_string(), GraphValue::Scalar(json!("Iowa"))),
        ]];
        let result = ok_result(vec![]);
        let structure = GraphStructure::from_rows(&rows);
        let outcome = formatter().format_graph(&result, &rows, &structure, 50);

        assert_eq!(outcome.display, DisplayFormat::Graph);
        let card = &outcome.rows[0];
        assert_eq!(card["labels"], json!("[:State]"));
        assert_eq!(card["name"], json!("Iowa"));
    }

    #[test]
    fn test_truncation_keeps_backend_row_count() {
        let rows: Vec<GraphRow> = (0..120)
            .map(|i| vec![("s".to_string(), state_node(&i.to_string(), &format!("State{i}")))])
            .collect();
        let mut result = ok_result(vec![]);
        result.row_count = 120;
        let structure = GraphStructure::from_rows(&rows);
        let outcome = formatter().format_graph(&result, &rows, &structure, 50);

        assert_eq!(outcome.rows.len(), 50);
        assert_eq!(outcome.row_count, 120);
        assert!(outcome.truncated);
    }

    #[test]
    fn test_relational_truncation() {
        let rows: Vec<Value> = (0..120).map(|i| json!({"id": i})).collect();
        let result = ok_result(rows);
        let outcome = formatter().format_relational(&result, 50);

        assert_eq!(outcome.display, DisplayFormat::Table);
        assert_eq!(outcome.rows.len(), 50);
        assert_eq!(outcome.row_count, 120);
        assert!(outcome.truncated);
    }

    #[test]
    fn test_measurement_nodes_get_measure_arrows() {
        let mut properties = BTreeMap::new();
        properties.insert("metric_type".to_string(), json!("Net Farm Income"));
        properties.insert("value".to_string(), json!(4200.5));
        let rows = vec![vec![(
            "m".to_string(),
            GraphValue::Node(GraphNode {
                id: "n:7".to_string(),
                labels: vec!["Measurement".to_string()],
                properties,
            }),
        )]];
        let result = ok_result(vec![]);
        let structure = GraphStructure::from_rows(&rows);
        let outcome = formatter().format_graph(&result, &rows, &structure, 50);

        let card = &outcome.rows[0];
        assert_eq!(card["relationships"], json!(["←MEASURES_INCOME(1)"]));
    }

    #[test]
    fn test_flat_entity_rows_without_node_fields_stay_tabular() {
        let rows = vec![vec![
            ("state".to_string(), GraphValue::Scalar(json!("Texas"))),
            ("measurement_count".to_string(), GraphValue::Scalar(json!(14))),
        ]];
        let result = ok_result(vec![]);
        let structure = GraphStructure::from_rows(&rows);
        let outcome = formatter().format_graph(&result, &rows, &structure, 50);

        assert_eq!(outcome.display, DisplayFormat::Table);
        assert_eq!(outcome.rows[0]["state"], json!("Texas"));
    }

    #[test]
    fn test_mixed_rows_fall_back_per_record() {
        // One record has a node field, another only a recognizable entity.
        let rows = vec![
            vec![
                ("state_node".to_string(), GraphValue::Scalar(json!({"name": "Iowa"}))),
                ("state".to_string(), GraphValue::Scalar(json!("Iowa"))),
            ],
            vec![
                ("state".to_string(), GraphValue::Scalar(json!("Texas"))),
                ("measurement_count".to_string(), GraphValue::Scalar(json!(14))),
            ],
        ];
        let result = ok_result(vec![]);
        let structure = GraphStructure::from_rows(&rows);
        let outcome = formatter().format_graph(&result, &rows, &structure, 50);

        assert_eq!(outcome.display, DisplayFormat::Graph);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[1]["name"], json!("Texas"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(format_value(&json!(999)), "999");
        assert_eq!(format_value(&json!(1000)), "1,000");
        assert_eq!(format_value(&json!(-1234567)), "-1,234,567");
    }
}
