use anyhow::Result;

use crate::config::Config;
use crate::db::{GraphTransport, Neo4jTransport, RelationalTransport, SupabaseTransport};

/// Checks connectivity of both backends and reports per-backend status.
/// Exits non-zero when either backend is unreachable.
pub async fn run() -> Result<()> {
    let config = Config::from_env()?;

    let relational =
        SupabaseTransport::new(config.supabase_url.as_str(), config.supabase_key.as_str());
    let relational_ok = relational.health_check().await;
    println!("relational: {}", if relational_ok { "ok" } else { "unreachable" });

    let graph = Neo4jTransport::new(
        config.neo4j_uri.as_str(),
        config.neo4j_user.as_str(),
        config.neo4j_password.as_str(),
    );
    let graph_ok = graph.reconnect().await.is_ok();
    println!("graph:      {}", if graph_ok { "ok" } else { "unreachable" });

    println!();
    println!("max results:   {}", config.max_results);
    println!("query timeout: {}s", config.query_timeout.as_secs());
    println!("max retries:   {}", config.max_retries);

    if !relational_ok || !graph_ok {
        anyhow::bail!("one or more backends unreachable");
    }
    Ok(())
}
