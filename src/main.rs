use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use code_search::config::Config;
use code_search::models::{ComplexityLevel, SearchMode, SearchRequest};
use code_search::query::QueryProcessor;
use code_search::search::Engine;

#[derive(Parser)]
#[command(
    name = "code-search",
    version,
    about = "Contextual code search over a source tree",
    long_about = "Extracts functions, classes and blocks from a source tree, then answers\n\
                  natural-language, keyword, semantic or regex queries with ranked snippets.\n\n\
                  Examples:\n  \
                    code-search search . 'bubble sort' --language python\n  \
                    code-search similar . src/sort.py:1:12\n  \
                    code-search stats .\n  \
                    code-search suggest 'binary'"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file (default: environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Index ROOT and run one search
    Search {
        root: PathBuf,
        query: String,

        /// semantic, keyword, hybrid or pattern
        #[arg(long, default_value = "hybrid")]
        mode: SearchMode,

        /// Only return snippets in this language (repeatable)
        #[arg(long = "language")]
        languages: Vec<String>,

        /// Only return snippets of this complexity: low, medium, high (repeatable)
        #[arg(long)]
        complexity: Vec<ComplexityLevel>,

        #[arg(long)]
        max_results: Option<usize>,

        /// Minimum similarity, 0 to 1
        #[arg(long)]
        threshold: Option<f32>,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long)]
        page_size: Option<usize>,

        /// Disable synonym expansion
        #[arg(long)]
        no_expand: bool,

        /// Print the per-factor score breakdown of each result
        #[arg(long)]
        explain: bool,
    },
    /// Index ROOT and list snippets similar to ID
    Similar {
        root: PathBuf,
        id: String,

        #[arg(long, default_value = "10")]
        limit: usize,

        #[arg(long, default_value = "0.1")]
        threshold: f32,
    },
    /// Index ROOT and print corpus statistics
    Stats { root: PathBuf },
    /// Complete a partially typed query
    Suggest {
        partial: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Describe how a query is understood
    Analyze { query: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env(),
    };

    match cli.command {
        Command::Search {
            root,
            query,
            mode,
            languages,
            complexity,
            max_results,
            threshold,
            page,
            page_size,
            no_expand,
            explain,
        } => {
            let engine = indexed_engine(config, &root).await?;
            let mut request = SearchRequest::new(query);
            request.mode = mode;
            request.languages = languages;
            request.complexity = complexity;
            request.max_results = max_results;
            request.similarity_threshold = threshold;
            request.page = page;
            request.page_size = page_size;
            request.expand = !no_expand;

            let response = engine.search(&request).await?;
            if explain {
                let explanations: Vec<_> = response.results.iter().map(|r| engine.explain(r)).collect();
                print_json(&explanations)?;
            } else {
                print_json(&response)?;
            }
        }
        Command::Similar {
            root,
            id,
            limit,
            threshold,
        } => {
            let engine = indexed_engine(config, &root).await?;
            if engine.snippet(&id).is_none() {
                tracing::warn!(id = %id, "no snippet with this id");
            }
            print_json(&engine.find_similar(&id, limit, threshold)?)?;
        }
        Command::Stats { root } => {
            let engine = indexed_engine(config, &root).await?;
            print_json(&engine.stats())?;
        }
        Command::Suggest { partial, limit } => {
            print_json(&QueryProcessor::new().suggestions(&partial, limit))?;
        }
        Command::Analyze { query } => {
            let engine = Engine::start(config).await?;
            print_json(&engine.processor().analyze(&query).await)?;
        }
    }

    Ok(())
}

async fn indexed_engine(config: Config, root: &Path) -> anyhow::Result<Engine> {
    tracing::info!(
        embedding = %config.embedding.provider,
        root = %root.display(),
        "indexing"
    );
    let engine = Engine::start(config).await?;
    engine
        .build_from_dir(root)
        .await
        .with_context(|| format!("failed to index {}", root.display()))?;
    Ok(engine)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
