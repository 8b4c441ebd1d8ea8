use clap::{Parser, Subcommand, ValueEnum};

/// Agroquery: dual-backend natural-language search over agricultural data
#[derive(Parser)]
#[command(
    author,
    version,
    about = "Natural-language search across relational and graph agricultural data stores"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a natural-language search against both backends
    Search {
        /// Natural language query (e.g., "show corn production trends in Iowa")
        query: String,

        /// Output format (text, json)
        #[arg(long, short, default_value = "text")]
        format: OutputFormat,

        /// Maximum number of results per backend
        #[arg(long, short)]
        limit: Option<usize>,

        /// Print the generated queries with explanations instead of results
        #[arg(long)]
        explain: bool,
    },

    /// List sample queries for demonstration
    Samples,

    /// Check connectivity of both backends
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
