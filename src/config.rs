use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Runtime configuration read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_key: String,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    /// Display cap per backend.
    pub max_results: usize,
    pub query_timeout: Duration,
    pub max_retries: u32,
}

impl Config {
    /// Backend credentials are required; tuning knobs fall back to defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            supabase_url: required("SUPABASE_URL")?,
            supabase_key: required("SUPABASE_KEY")?,
            neo4j_uri: required("NEO4J_URI")?,
            neo4j_user: required("NEO4J_USER")?,
            neo4j_password: required("NEO4J_PASSWORD")?,
            max_results: parsed("AGROQUERY_MAX_RESULTS", 50)?,
            query_timeout: Duration::from_secs(parsed("AGROQUERY_QUERY_TIMEOUT_SECS", 5)?),
            max_retries: parsed("AGROQUERY_MAX_RETRIES", 3)?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("invalid value for {name}")),
        Err(_) => Ok(default),
    }
}
