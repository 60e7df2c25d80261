use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lodestone_core::Config;
use lodestone_retrieval::{MetadataFilter, Pipeline, SearchResult};

#[derive(Parser)]
#[command(name = "lodestone", version)]
#[command(about = "Chunk documents, embed them, and answer questions from a vector store")]
struct Cli {
    /// Configuration file (TOML). Missing file means built-in defaults.
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed, and store documents
    Process {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Search stored chunks for a question
    Query {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Metadata filter as key=value, repeatable
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },
    /// Process one document, then query it in the same run
    Ask {
        path: PathBuf,
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Delete all stored vectors and reset the pipeline state
    Clear,
    /// Show lifecycle state, collection, and component details
    Info,
    /// Inspect or persist the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the effective configuration to a file
    Save { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    match cli.command {
        Command::Process { paths } => {
            let pipeline = Pipeline::new(config).await?;
            for path in paths {
                let stats = pipeline.process_document(&path).await?;
                println!(
                    "{}: {} chunk(s), {} page(s), {} char(s) in {:.2?}",
                    stats.document_path,
                    stats.chunks_created,
                    stats.pages_processed,
                    stats.total_characters,
                    stats.processing_time,
                );
            }
        }
        Command::Query {
            question,
            top_k,
            filters,
        } => {
            let pipeline = Pipeline::new(config).await?;
            let results = if filters.is_empty() {
                pipeline.query(&question, top_k).await?
            } else {
                pipeline
                    .query_filtered(&question, top_k, parse_filters(&filters)?)
                    .await?
            };
            print_results(&results);
        }
        Command::Ask {
            path,
            question,
            top_k,
        } => {
            let pipeline = Pipeline::new(config).await?;
            pipeline.process_document(&path).await?;
            let results = pipeline.query(&question, top_k).await?;
            print_results(&results);
        }
        Command::Clear => {
            let pipeline = Pipeline::new(config).await?;
            pipeline.clear_database().await?;
            println!("database cleared");
        }
        Command::Info => {
            let pipeline = Pipeline::new(config).await?;
            let info = pipeline.system_info().await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Config { action } => match action {
            ConfigAction::Show => print!("{}", toml::to_string_pretty(&config)?),
            ConfigAction::Save { path } => {
                config.save(&path)?;
                println!("configuration written to {}", path.display());
            }
        },
    }
    Ok(())
}

/// Parse repeated `key=value` pairs. Values that read as integers or
/// booleans are typed accordingly, everything else stays a string.
fn parse_filters(pairs: &[String]) -> anyhow::Result<MetadataFilter> {
    let mut filter = MetadataFilter::default();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("filter must be key=value, got: {pair}"))?;
        let value = if let Ok(n) = value.parse::<i64>() {
            serde_json::Value::from(n)
        } else if let Ok(b) = value.parse::<bool>() {
            serde_json::Value::from(b)
        } else {
            serde_json::Value::from(value)
        };
        filter.0.insert(key.to_owned(), value);
    }
    Ok(filter)
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("no results above the score threshold");
        return;
    }
    for (rank, result) in results.iter().enumerate() {
        let source = result
            .metadata
            .get("source_document")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        println!("{}. [{:.4}] {}", rank + 1, result.score, source);
        println!("   {}", result.content);
    }
}
