use anyhow::Result;

use crate::engine::sample_queries;

/// Prints the sample query catalogue grouped by category.
pub fn run() -> Result<()> {
    let samples = sample_queries();

    let mut categories: Vec<&str> = samples.iter().map(|s| s.category).collect();
    categories.sort_unstable();
    categories.dedup();

    for category in categories {
        println!("{category}:");
        for sample in samples.iter().filter(|s| s.category == category) {
            println!("  {}: \"{}\"", sample.title, sample.query);
            println!("      {}", sample.description);
        }
        println!();
    }

    Ok(())
}
