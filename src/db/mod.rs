pub mod graph;
pub mod relational;

pub use graph::Neo4jTransport;
pub use relational::SupabaseTransport;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::graph::GraphRow;
use crate::query::QuerySpec;

/// Failure modes of a backend execution. `Transient` failures may succeed on
/// retry; everything else fails the backend for this request.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("transient backend failure: {message}")]
    Transient {
        message: String,
        /// Set when the driver's connection pool is broken and the client
        /// must be recreated before the next attempt.
        defunct: bool,
    },
    #[error("backend query timed out after {0:?}")]
    Timeout(Duration),
    #[error("query failed: {0}")]
    Query(String),
}

/// Counters reported by a backend alongside its rows. Read-only queries
/// leave every counter at zero; the graph driver exposes no counter summary
/// on its row stream, so the graph side stays at the zero default too.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QueryStatistics {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
}

/// Outcome of one backend execution. A failed backend still produces a
/// result, with `error` set and no rows.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutionResult {
    pub rows: Vec<Value>,
    /// Seconds spent on this backend, including retries.
    pub execution_time: f64,
    /// Total matching rows as reported by the backend, which may exceed
    /// `rows.len()` after display truncation.
    pub row_count: usize,
    pub error: Option<String>,
    pub statistics: QueryStatistics,
}

impl ExecutionResult {
    pub fn failed(error: impl Into<String>, execution_time: f64) -> Self {
        Self {
            rows: Vec::new(),
            execution_time,
            row_count: 0,
            error: Some(error.into()),
            statistics: QueryStatistics::default(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Rows and metadata from a graph execution, before normalization.
#[derive(Debug, Default)]
pub struct GraphQueryOutput {
    pub rows: Vec<GraphRow>,
    pub execution_time: f64,
    pub statistics: QueryStatistics,
}

/// Relational backend boundary.
#[async_trait]
pub trait RelationalTransport: Send + Sync {
    async fn execute(&self, spec: &QuerySpec) -> Result<ExecutionResult, BackendError>;
    async fn health_check(&self) -> bool;
}

/// Graph backend boundary. Connection lifecycle is explicit so the executor
/// can drive reconnection on transient failures.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    async fn execute(&self, spec: &QuerySpec) -> Result<GraphQueryOutput, BackendError>;
    async fn is_connected(&self) -> bool;
    async fn reconnect(&self) -> Result<(), BackendError>;
}

/// Connection state tracked while retrying the graph backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphState {
    Connected,
    Reconnecting,
    Backoff,
    Failed,
}

/// Runs the relational and graph queries concurrently. Each backend fails
/// independently; one failing never aborts the other.
pub struct DualExecutor {
    relational: Arc<dyn RelationalTransport>,
    graph: Arc<dyn GraphTransport>,
    max_retries: u32,
    base_delay: Duration,
    query_timeout: Duration,
}

/// Results of both backends plus the graph rows kept for normalization.
pub struct DualOutcome {
    pub relational: ExecutionResult,
    pub graph: ExecutionResult,
    pub graph_rows: Vec<GraphRow>,
    /// Sum of both backend times, not wall-clock time.
    pub total_execution_time: f64,
}

impl DualExecutor {
    pub fn new(
        relational: Arc<dyn RelationalTransport>,
        graph: Arc<dyn GraphTransport>,
        max_retries: u32,
        base_delay: Duration,
        query_timeout: Duration,
    ) -> Self {
        Self { relational, graph, max_retries, base_delay, query_timeout }
    }

    /// Execute both query specs concurrently and collect per-backend results.
    pub async fn execute(&self, sql: &QuerySpec, cypher: &QuerySpec) -> DualOutcome {
        let (relational, (graph, graph_rows)) =
            tokio::join!(self.run_relational(sql), self.run_graph(cypher));

        let total_execution_time = relational.execution_time + graph.execution_time;
        DualOutcome { relational, graph, graph_rows, total_execution_time }
    }

    async fn run_relational(&self, spec: &QuerySpec) -> ExecutionResult {
        let started = std::time::Instant::now();
        let attempt = tokio::time::timeout(self.query_timeout, self.relational.execute(spec));
        match attempt.await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                error!(error = %err, "relational query failed");
                ExecutionResult::failed(err.to_string(), started.elapsed().as_secs_f64())
            }
            Err(_) => {
                error!(timeout = ?self.query_timeout, "relational query timed out");
                ExecutionResult::failed(
                    BackendError::Timeout(self.query_timeout).to_string(),
                    started.elapsed().as_secs_f64(),
                )
            }
        }
    }

    async fn run_graph(&self, spec: &QuerySpec) -> (ExecutionResult, Vec<GraphRow>) {
        let started = std::time::Instant::now();

        let mut state = if self.graph.is_connected().await {
            GraphState::Connected
        } else {
            GraphState::Reconnecting
        };
        let mut attempt: u32 = 0;
        let mut last_error = String::new();

        loop {
            match state {
                GraphState::Connected => {
                    attempt += 1;
                    let run = tokio::time::timeout(self.query_timeout, self.graph.execute(spec));
                    match run.await {
                        Ok(Ok(output)) => {
                            let result = ExecutionResult {
                                rows: Vec::new(),
                                execution_time: started.elapsed().as_secs_f64(),
                                row_count: output.rows.len(),
                                error: None,
                                statistics: output.statistics,
                            };
                            return (result, output.rows);
                        }
                        Ok(Err(BackendError::Transient { message, defunct })) => {
                            warn!(attempt, defunct, error = %message, "transient graph failure");
                            last_error = message;
                            state = if attempt >= self.max_retries {
                                GraphState::Failed
                            } else if defunct {
                                GraphState::Reconnecting
                            } else {
                                GraphState::Backoff
                            };
                        }
                        Ok(Err(err)) => {
                            error!(error = %err, "graph query failed");
                            last_error = err.to_string();
                            state = GraphState::Failed;
                        }
                        Err(_) => {
                            error!(timeout = ?self.query_timeout, "graph query timed out");
                            last_error = BackendError::Timeout(self.query_timeout).to_string();
                            state = GraphState::Failed;
                        }
                    }
                }
                GraphState::Reconnecting => {
                    debug!(attempt, "recreating graph client");
                    match self.graph.reconnect().await {
                        Ok(()) => {
                            info!("graph client reconnected");
                            state = if attempt == 0 {
                                GraphState::Connected
                            } else {
                                GraphState::Backoff
                            };
                        }
                        Err(err) => {
                            warn!(error = %err, "graph reconnect failed");
                            last_error = err.to_string();
                            state = if attempt >= self.max_retries {
                                GraphState::Failed
                            } else {
                                GraphState::Backoff
                            };
                            // The pre-query reconnect counts as an attempt
                            // when it fails, so a dead backend still exits.
                            if attempt == 0 {
                                attempt = 1;
                            }
                        }
                    }
                }
                GraphState::Backoff => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
                    debug!(attempt, ?delay, "backing off before graph retry");
                    tokio::time::sleep(delay).await;
                    state = GraphState::Connected;
                }
                GraphState::Failed => {
                    let result = ExecutionResult::failed(
                        last_error.clone(),
                        started.elapsed().as_secs_f64(),
                    );
                    return (result, Vec::new());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    struct OkRelational;

    #[async_trait]
    impl RelationalTransport for OkRelational {
        async fn execute(&self, _spec: &QuerySpec) -> Result<ExecutionResult, BackendError> {
            Ok(ExecutionResult {
                rows: vec![json!({"state": "Iowa"})],
                execution_time: 0.01,
                row_count: 1,
                error: None,
                statistics: QueryStatistics::default(),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    struct FailingRelational;

    #[async_trait]
    impl RelationalTransport for FailingRelational {
        async fn execute(&self, _spec: &QuerySpec) -> Result<ExecutionResult, BackendError> {
            Err(BackendError::Unavailable("relational store down".into()))
        }

        async fn health_check(&self) -> bool {
            false
        }
    }

    /// Graph transport that fails transiently `failures` times before
    /// succeeding, counting executes and reconnects.
    struct FlakyGraph {
        failures: u32,
        defunct: bool,
        executes: AtomicU32,
        reconnects: AtomicU32,
    }

    impl FlakyGraph {
        fn new(failures: u32, defunct: bool) -> Self {
            Self {
                failures,
                defunct,
                executes: AtomicU32::new(0),
                reconnects: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GraphTransport for FlakyGraph {
        async fn execute(&self, _spec: &QuerySpec) -> Result<GraphQueryOutput, BackendError> {
            let n = self.executes.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(BackendError::Transient {
                    message: "connection reset".into(),
                    defunct: self.defunct,
                });
            }
            Ok(GraphQueryOutput {
                rows: vec![vec![(
                    "total".to_string(),
                    crate::graph::GraphValue::Scalar(json!(7)),
                )]],
                execution_time: 0.01,
                statistics: QueryStatistics::default(),
            })
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn reconnect(&self) -> Result<(), BackendError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn specs() -> (QuerySpec, QuerySpec) {
        use crate::query::QueryLanguage;
        (
            QuerySpec::new(QueryLanguage::Relational, "SELECT 1".into(), 10),
            QuerySpec::new(QueryLanguage::Graph, "MATCH (n) RETURN n".into(), 10),
        )
    }

    fn executor(
        relational: Arc<dyn RelationalTransport>,
        graph: Arc<dyn GraphTransport>,
    ) -> DualExecutor {
        DualExecutor::new(relational, graph, 3, Duration::from_millis(1), Duration::from_secs(1))
    }

    #[test]
    fn test_statistics_default_to_zero_counters() {
        let json = serde_json::to_value(QueryStatistics::default()).unwrap();
        for counter in [
            "nodes_created",
            "nodes_deleted",
            "relationships_created",
            "relationships_deleted",
            "properties_set",
        ] {
            assert_eq!(json[counter], serde_json::json!(0), "{counter}");
        }
    }

    #[tokio::test]
    async fn test_backends_fail_independently() {
        let exec = executor(Arc::new(FailingRelational), Arc::new(FlakyGraph::new(0, false)));
        let (sql, cypher) = specs();
        let outcome = exec.execute(&sql, &cypher).await;

        assert!(!outcome.relational.is_ok());
        assert!(outcome.graph.is_ok());
        assert_eq!(outcome.graph_rows.len(), 1);
    }

    #[tokio::test]
    async fn test_graph_retries_then_succeeds() {
        let graph = Arc::new(FlakyGraph::new(2, false));
        let exec = executor(Arc::new(OkRelational), graph.clone());
        let (sql, cypher) = specs();
        let outcome = exec.execute(&sql, &cypher).await;

        assert!(outcome.graph.is_ok());
        assert_eq!(graph.executes.load(Ordering::SeqCst), 3);
        // Non-defunct transients back off without recreating the client.
        assert_eq!(graph.reconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_graph_retry_bound() {
        let graph = Arc::new(FlakyGraph::new(10, false));
        let exec = executor(Arc::new(OkRelational), graph.clone());
        let (sql, cypher) = specs();
        let outcome = exec.execute(&sql, &cypher).await;

        assert!(!outcome.graph.is_ok());
        assert_eq!(graph.executes.load(Ordering::SeqCst), 3);
        assert!(outcome.graph.error.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_defunct_failure_recreates_client() {
        let graph = Arc::new(FlakyGraph::new(1, true));
        let exec = executor(Arc::new(OkRelational), graph.clone());
        let (sql, cypher) = specs();
        let outcome = exec.execute(&sql, &cypher).await;

        assert!(outcome.graph.is_ok());
        assert_eq!(graph.reconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_total_time_is_sum_of_backends() {
        let exec = executor(Arc::new(OkRelational), Arc::new(FlakyGraph::new(0, false)));
        let (sql, cypher) = specs();
        let outcome = exec.execute(&sql, &cypher).await;

        let expected = outcome.relational.execution_time + outcome.graph.execution_time;
        assert!((outcome.total_execution_time - expected).abs() < f64::EPSILON);
    }

    struct SlowGraph;

    #[async_trait]
    impl GraphTransport for SlowGraph {
        async fn execute(&self, _spec: &QuerySpec) -> Result<GraphQueryOutput, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(GraphQueryOutput::default())
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn reconnect(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_graph_timeout_fails_without_retry() {
        let exec = DualExecutor::new(
            Arc::new(OkRelational),
            Arc::new(SlowGraph),
            3,
            Duration::from_millis(1),
            Duration::from_millis(50),
        );
        let (sql, cypher) = specs();
        let outcome = exec.execute(&sql, &cypher).await;

        assert!(!outcome.graph.is_ok());
        assert!(outcome.graph.error.as_deref().unwrap().contains("timed out"));
    }
}
