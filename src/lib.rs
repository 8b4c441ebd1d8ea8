pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod format;
pub mod graph;
pub mod query;

pub use config::Config;
pub use engine::{ResultEnvelope, SearchEngine};
