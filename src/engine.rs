//! Ties the pipeline together: extract keywords, classify intent,
//! synthesize both queries, run them concurrently, format the results.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::db::{DualExecutor, GraphTransport, Neo4jTransport, RelationalTransport, SupabaseTransport};
use crate::format::{BackendOutcome, ResultFormatter};
use crate::graph::{GraphStructure, RelationshipKnowledge};
use crate::query::{CypherSynthesizer, Intent, KeywordExtractor, SqlSynthesizer};

const MAX_KEYWORDS: usize = 10;

/// Final output of one search: both backend outcomes plus the derived
/// interpretation of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub query: String,
    pub intent: Intent,
    pub keywords: Vec<String>,
    pub relational: BackendOutcome,
    pub graph: BackendOutcome,
    /// Present when the graph backend returned graph entities.
    pub graph_structure: Option<GraphStructure>,
    /// Sum of both backend execution times, in seconds.
    pub total_execution_time: f64,
}

pub struct SearchEngine {
    extractor: KeywordExtractor,
    sql: SqlSynthesizer,
    cypher: CypherSynthesizer,
    executor: DualExecutor,
    formatter: ResultFormatter,
    default_limit: usize,
}

impl SearchEngine {
    pub fn new(
        relational: Arc<dyn RelationalTransport>,
        graph: Arc<dyn GraphTransport>,
        max_retries: u32,
        query_timeout: Duration,
        default_limit: usize,
    ) -> Self {
        Self {
            extractor: KeywordExtractor::new(),
            sql: SqlSynthesizer::new(),
            cypher: CypherSynthesizer::new(),
            executor: DualExecutor::new(
                relational,
                graph,
                max_retries,
                Duration::from_millis(250),
                query_timeout,
            ),
            formatter: ResultFormatter::new(RelationshipKnowledge::new()),
            default_limit,
        }
    }

    /// Wire up the production transports from configuration.
    pub fn from_config(config: &Config) -> Self {
        let relational = Arc::new(SupabaseTransport::new(
            config.supabase_url.as_str(),
            config.supabase_key.as_str(),
        ));
        let graph = Arc::new(Neo4jTransport::new(
            config.neo4j_uri.as_str(),
            config.neo4j_user.as_str(),
            config.neo4j_password.as_str(),
        ));
        Self::new(
            relational,
            graph,
            config.max_retries,
            config.query_timeout,
            config.max_results,
        )
    }

    /// Run one natural-language search end to end.
    pub async fn run(&self, query: &str, max_results: Option<usize>) -> Result<ResultEnvelope> {
        let limit = max_results.unwrap_or(self.default_limit);

        let intent = self.extractor.classify_intent(query);
        let keywords = self.extractor.extract(query, MAX_KEYWORDS);
        info!(?intent, ?keywords, "interpreted query");

        let sql_spec = self.sql.synthesize(intent, &keywords, limit);
        let cypher_spec = self.cypher.synthesize(intent, &keywords, limit);

        let outcome = self.executor.execute(&sql_spec, &cypher_spec).await;

        let structure = GraphStructure::from_rows(&outcome.graph_rows);
        let relational = self.formatter.format_relational(&outcome.relational, limit);
        let graph =
            self.formatter.format_graph(&outcome.graph, &outcome.graph_rows, &structure, limit);

        Ok(ResultEnvelope {
            query: query.to_string(),
            intent,
            keywords,
            relational,
            graph,
            graph_structure: if structure.is_empty() { None } else { Some(structure) },
            total_execution_time: outcome.total_execution_time,
        })
    }
}

/// A canned demonstration query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleQuery {
    pub title: &'static str,
    pub query: &'static str,
    pub category: &'static str,
    pub description: &'static str,
}

pub fn sample_queries() -> Vec<SampleQuery> {
    vec![
        SampleQuery {
            title: "Supply Chain Impact",
            query: "Which farms will be affected if fertilizer supplier X has contamination issues?",
            category: "Supply Chain",
            description: "Shows how graph databases reveal cascading supply chain impacts",
        },
        SampleQuery {
            title: "Equipment Maintenance",
            query: "What patterns predict tractor maintenance failures?",
            category: "Equipment",
            description: "Demonstrates pattern recognition across equipment networks",
        },
        SampleQuery {
            title: "Organic Certification",
            query: "Where should we focus organic certification efforts?",
            category: "Market Analysis",
            description: "Identifies influence nodes in agricultural communities",
        },
        SampleQuery {
            title: "Crop Production Trends",
            query: "Show me corn production trends in Iowa",
            category: "Production",
            description: "Analyzes crop yields and production patterns",
        },
        SampleQuery {
            title: "Supplier Reliability",
            query: "Which equipment suppliers are most reliable?",
            category: "Supply Chain",
            description: "Evaluates supplier performance across farm networks",
        },
        SampleQuery {
            title: "Drought Impact",
            query: "Show me all farms affected by drought in California",
            category: "Environmental",
            description: "Maps environmental impacts across agricultural regions",
        },
        SampleQuery {
            title: "Market Access",
            query: "Find organic farms near grain elevators",
            category: "Market Analysis",
            description: "Identifies market opportunities based on proximity",
        },
        SampleQuery {
            title: "Cost Analysis",
            query: "What's the impact of fertilizer price increases?",
            category: "Economics",
            description: "Analyzes economic impacts across farm operations",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::db::{
        BackendError, ExecutionResult, GraphQueryOutput, QueryStatistics,
    };
    use crate::format::DisplayFormat;
    use crate::graph::{GraphNode, GraphValue};
    use crate::query::QuerySpec;

    struct StubRelational;

    #[async_trait]
    impl RelationalTransport for StubRelational {
        async fn execute(&self, spec: &QuerySpec) -> Result<ExecutionResult, BackendError> {
            assert!(spec.text.to_uppercase().contains("SELECT"));
            Ok(ExecutionResult {
                rows: vec![json!({"place_name": "Iowa", "value": 1200})],
                execution_time: 0.02,
                row_count: 1,
                error: None,
                statistics: QueryStatistics::default(),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    struct StubGraph;

    #[async_trait]
    impl GraphTransport for StubGraph {
        async fn execute(&self, spec: &QuerySpec) -> Result<GraphQueryOutput, BackendError> {
            assert!(spec.text.contains("MATCH"));
            let mut properties = std::collections::BTreeMap::new();
            properties.insert("name".to_string(), json!("Iowa"));
            Ok(GraphQueryOutput {
                rows: vec![vec![(
                    "state_node".to_string(),
                    GraphValue::Node(GraphNode {
                        id: "n:1".to_string(),
                        labels: vec!["State".to_string()],
                        properties,
                    }),
                )]],
                execution_time: 0.03,
                statistics: QueryStatistics::default(),
            })
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn reconnect(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn engine() -> SearchEngine {
        SearchEngine::new(
            Arc::new(StubRelational),
            Arc::new(StubGraph),
            3,
            Duration::from_secs(1),
            50,
        )
    }

    #[tokio::test]
    async fn test_end_to_end_search() {
        let envelope = engine()
            .run("Show me corn production trends in Iowa", None)
            .await
            .unwrap();

        assert_eq!(envelope.intent, Intent::TrendAnalysis);
        assert!(envelope.keywords.contains(&"corn".to_string()));
        assert!(envelope.keywords.contains(&"iowa".to_string()));

        assert_eq!(envelope.relational.display, DisplayFormat::Table);
        assert_eq!(envelope.relational.rows.len(), 1);

        assert_eq!(envelope.graph.display, DisplayFormat::Graph);
        assert_eq!(envelope.graph.rows[0]["name"], json!("Iowa"));

        let structure = envelope.graph_structure.as_ref().unwrap();
        assert!(structure.nodes.contains_key("n:1"));

        let expected =
            envelope.relational.execution_time + envelope.graph.execution_time;
        assert!((envelope.total_execution_time - expected).abs() < f64::EPSILON);
    }

    struct DeadGraph;

    #[async_trait]
    impl GraphTransport for DeadGraph {
        async fn execute(&self, _spec: &QuerySpec) -> Result<GraphQueryOutput, BackendError> {
            Err(BackendError::Unavailable("graph store down".into()))
        }

        async fn is_connected(&self) -> bool {
            false
        }

        async fn reconnect(&self) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("graph store down".into()))
        }
    }

    #[tokio::test]
    async fn test_search_survives_graph_outage() {
        let engine = SearchEngine::new(
            Arc::new(StubRelational),
            Arc::new(DeadGraph),
            3,
            Duration::from_secs(1),
            50,
        );
        let envelope = engine.run("How many farms grow corn?", None).await.unwrap();

        assert!(envelope.relational.error.is_none());
        assert!(envelope.graph.error.is_some());
        assert!(envelope.graph.rows.is_empty());
        assert!(envelope.graph_structure.is_none());
    }

    #[test]
    fn test_sample_queries_cover_categories() {
        let samples = sample_queries();
        assert_eq!(samples.len(), 8);
        assert!(samples.iter().any(|s| s.category == "Supply Chain"));
        assert!(samples.iter().any(|s| s.category == "Environmental"));
    }
}
