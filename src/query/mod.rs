mod cypher;
mod keywords;
mod sanitize;
mod sql;

pub use cypher::{CypherSynthesizer, NODE_TYPES, RELATIONSHIP_TYPES};
pub use keywords::KeywordExtractor;
pub use sanitize::{sanitize_cypher, sanitize_sql};
pub use sql::SqlSynthesizer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Classified purpose of a natural-language request. Exactly one intent is
/// chosen per request, by first-match priority in the order declared here
/// (Prediction highest).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Prediction,
    ImpactAnalysis,
    TrendAnalysis,
    Comparison,
    Ranking,
    LocationBased,
    Aggregation,
    General,
}

/// Target query language of a synthesized spec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryLanguage {
    Relational,
    Graph,
}

/// A synthesized query plus metadata, not yet executed. Immutable once
/// produced; the text is opaque to the executor.
///
/// Free-text keyword tokens are carried in `params` and referenced from the
/// query text as `$name` placeholders so the transports bind them instead of
/// interpolating user input into the query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    pub language: QueryLanguage,
    pub text: String,
    pub params: BTreeMap<String, String>,
    pub limit: usize,
    /// Table or node types the strategy touched. Used for introspection, not
    /// execution.
    pub involved_entities: Vec<String>,
}

impl QuerySpec {
    pub fn new(language: QueryLanguage, text: String, limit: usize) -> Self {
        Self {
            language,
            text,
            params: BTreeMap::new(),
            limit,
            involved_entities: Vec::new(),
        }
    }
}
