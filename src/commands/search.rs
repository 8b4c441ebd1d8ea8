use anyhow::Result;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::engine::{ResultEnvelope, SearchEngine};
use crate::format::{BackendOutcome, DisplayFormat};
use crate::query::{CypherSynthesizer, KeywordExtractor, SqlSynthesizer};

/// Runs the search command with the provided arguments
pub async fn run(
    query: &str,
    format: OutputFormat,
    limit: Option<usize>,
    explain: bool,
) -> Result<()> {
    tracing::info!("searching: {}", query);

    if explain {
        return print_explanation(query, limit.unwrap_or(50));
    }

    let config = Config::from_env()?;
    let engine = SearchEngine::from_config(&config);
    let envelope = engine.run(query, limit).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&envelope)?),
        OutputFormat::Text => print_text(&envelope),
    }

    Ok(())
}

/// Synthesize both queries without executing them and describe what each
/// would do.
fn print_explanation(query: &str, limit: usize) -> Result<()> {
    let extractor = KeywordExtractor::new();
    let sql = SqlSynthesizer::new();
    let cypher = CypherSynthesizer::new();

    let intent = extractor.classify_intent(query);
    let keywords = extractor.extract(query, 10);

    println!("Intent:   {}", serde_json::to_string(&intent)?.trim_matches('"'));
    println!("Keywords: {}", keywords.join(", "));
    println!();

    let sql_spec = sql.synthesize(intent, &keywords, limit);
    println!("SQL:\n  {}", sql_spec.text);
    println!("  {}", sql.explain(&sql_spec));
    println!();

    let cypher_spec = cypher.synthesize(intent, &keywords, limit);
    println!("Cypher:\n  {}", cypher_spec.text);
    println!("  {}", cypher.explain(&cypher_spec));
    println!();

    println!("Graph entities:");
    for entity in &cypher_spec.involved_entities {
        if let Some((label, properties)) =
            crate::query::NODE_TYPES.iter().find(|(label, _)| label == entity)
        {
            println!("  {label}: {}", properties.join(", "));
        }
    }

    let traversed: Vec<&(&str, &str)> = crate::query::RELATIONSHIP_TYPES
        .iter()
        .filter(|(rel_type, _)| cypher_spec.text.contains(rel_type))
        .collect();
    if !traversed.is_empty() {
        println!("Relationships:");
        for (rel_type, description) in traversed {
            println!("  {rel_type}: {description}");
        }
    }

    Ok(())
}

fn print_text(envelope: &ResultEnvelope) {
    println!("Query:    {}", envelope.query);
    println!("Intent:   {:?}", envelope.intent);
    println!("Keywords: {}", envelope.keywords.join(", "));
    println!();

    print_backend("Relational", &envelope.relational);
    println!();
    print_backend("Graph", &envelope.graph);
    println!();
    println!("Total execution time: {:.3}s", envelope.total_execution_time);
}

fn print_backend(label: &str, outcome: &BackendOutcome) {
    println!(
        "=== {} ({:.3}s, {} rows) ===",
        label, outcome.execution_time, outcome.row_count
    );

    if let Some(error) = &outcome.error {
        println!("  error: {error}");
        return;
    }
    if outcome.rows.is_empty() {
        println!("  no results");
        return;
    }

    match outcome.display {
        DisplayFormat::Table => {
            for row in &outcome.rows {
                println!("  {row}");
            }
        }
        DisplayFormat::Graph => {
            for card in &outcome.rows {
                let name = card["name"].as_str().unwrap_or("?");
                let labels = card["labels"].as_str().unwrap_or("[:Node]");
                let properties = join_strings(&card["properties"]);
                let relationships = join_strings(&card["relationships"]);
                println!("  {labels} {name}");
                if !properties.is_empty() {
                    println!("      {properties}");
                }
                if !relationships.is_empty() {
                    println!("      {relationships}");
                }
            }
        }
    }

    if outcome.truncated {
        println!("  (Limited to {} results, total: {})", outcome.rows.len(), outcome.row_count);
    }
}

fn join_strings(value: &serde_json::Value) -> String {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}
